use crate::context::{Context, Product};
use crate::{Dry, Engine, Liquid};

const CATALOG: &str = include_str!("../benchdata/catalog.liquid");

fn context() -> Context {
    let product = |title: &str, price, tags: &[&str], available| Product {
        title: title.to_owned(),
        price,
        tags: tags.iter().map(|t| (*t).to_owned()).collect(),
        available,
    };
    Context {
        shop: "Corner shop".to_owned(),
        products: vec![
            product("Kettle", 30, &["kitchen", "steel"], true),
            product("Lamp", 45, &[], false),
            product("Mug", 8, &["kitchen"], true),
        ],
    }
}

fn render<E: Engine>(source: &str, ctx: &Context) -> String {
    let mut engine = E::new();
    engine.add_template("bench", source);
    engine.render("bench", ctx)
}

#[test]
fn catalog() {
    let result = render::<Dry>(CATALOG, &context());
    assert_eq!(
        result,
        "<h1>CORNER SHOP</h1>
<ul>
  <li>1. Kettle: 60 (kitchen, steel)</li>
  <li>Lamp is sold out</li>
  <li>3. Mug: 16 (kitchen)</li>
</ul>
"
    );
}

#[test]
fn catalog_matches_liquid() {
    let ctx = crate::context::random(20);
    assert_eq!(render::<Dry>(CATALOG, &ctx), render::<Liquid>(CATALOG, &ctx));
}
