use rand::Rng;

#[derive(serde::Serialize)]
pub struct Context {
    pub shop: String,
    pub products: Vec<Product>,
}

#[derive(serde::Serialize)]
pub struct Product {
    pub title: String,
    pub price: u32,
    pub tags: Vec<String>,
    pub available: bool,
}

fn word<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len).map(|_| rng.gen_range('a'..='z')).collect()
}

/// Generates a shop with `n` random products.
pub fn random(n: usize) -> Context {
    let mut rng = rand::thread_rng();
    let shop = word(&mut rng, 12);
    let products = (0..n)
        .map(|_| Product {
            title: word(&mut rng, 20),
            price: rng.gen_range(1..500),
            tags: (0..rng.gen_range(0..4)).map(|_| word(&mut rng, 6)).collect(),
            available: !rng.gen_ratio(1, 4),
        })
        .collect();
    Context { shop, products }
}
