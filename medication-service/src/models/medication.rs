use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A medication as stored in the collection.
///
/// The identifier lives under MongoDB's `_id`; it is `None` until the store
/// assigns one on insert and is left out of the document while unset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: f64,
    #[serde(rename = "imageUrl", default)]
    pub image_url: String,
}

impl Medication {
    pub fn new(name: String, description: String, price: f64, image_url: String) -> Self {
        Self {
            id: None,
            name,
            description,
            price,
            image_url,
        }
    }

    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.id = Some(id);
        self
    }
}
