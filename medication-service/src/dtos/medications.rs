use crate::models::Medication;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Request body for create and update.
///
/// Absent or `null` fields decode to their zero value and unknown fields,
/// `id` included, are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MedicationPayload {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub price: f64,
    #[serde(rename = "imageUrl", deserialize_with = "null_as_default")]
    pub image_url: String,
}

impl MedicationPayload {
    /// Decode a request body. Only a JSON object is accepted; arrays and
    /// scalars are rejected even though serde would map them positionally.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        match serde_json::from_slice(body)? {
            object @ Value::Object(_) => Self::deserialize(object),
            other => Err(de::Error::custom(format!(
                "expected a medication object, found {}",
                json_kind(&other)
            ))),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl From<MedicationPayload> for Medication {
    fn from(payload: MedicationPayload) -> Self {
        Medication::new(
            payload.name,
            payload.description,
            payload.price,
            payload.image_url,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicationResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    pub price: f64,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

impl From<Medication> for MedicationResponse {
    fn from(medication: Medication) -> Self {
        Self {
            id: medication.id.map(|id| id.to_hex()),
            name: medication.name,
            description: medication.description,
            price: medication.price,
            image_url: medication.image_url,
        }
    }
}
