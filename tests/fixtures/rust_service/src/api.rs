use crate::model::{Book, Listing};

#[endpoint_exposed]
pub trait ReadService<T, ID> {
    fn get(&self, id: ID) -> Option<T>;
}

#[endpoint = "books"]
#[roles_allowed("ADMIN")]
pub struct BookEndpoint {
    store: Vec<Book>,
}

impl ReadService<Book, uuid::Uuid> for BookEndpoint {
    fn get(&self, id: uuid::Uuid) -> Option<Book> {
        self.store.iter().find(|b| b.id == id).cloned()
    }
}

impl BookEndpoint {
    pub fn new() -> Self {
        Self { store: Vec::new() }
    }

    #[permit_all]
    pub async fn search(&self, query: String, limit: Option<u32>) -> Result<Listing<Book>, String> {
        let items: Vec<Book> = self
            .store
            .iter()
            .filter(|b| b.title.contains(&query))
            .take(limit.unwrap_or(20) as usize)
            .cloned()
            .collect();
        let total = items.len() as u64;
        Ok(Listing { items, total })
    }

    pub fn save(&mut self, book: Book) -> Book {
        self.store.push(book.clone());
        book
    }

    fn reindex(&self) {}
}
