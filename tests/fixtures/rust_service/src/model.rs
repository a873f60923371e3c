#![non_null_api]

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: uuid::Uuid,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub author_name: String,
    #[nullable]
    pub subtitle: String,
    pub published: Option<chrono::NaiveDate>,
    pub genre: Genre,
    pub tags: Vec<String>,
    #[serde(skip)]
    pub cache_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Genre {
    Fiction,
    #[serde(rename = "non_fiction")]
    NonFiction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub total: u64,
}
