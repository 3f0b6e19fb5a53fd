//! Label encoders for the categorical form fields
//!
//! The classes of every field, and their order, come from the training
//! pipeline. A class's code is its position in that order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::{ForecastError, Result};

/// Categorical scenario fields, in form display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalField {
    ProductType,
    ProductCode,
    Variant,
    OilType,
    Region,
    Country,
    CustomerSegment,
    Channel,
    ApplicationArea,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 9] = [
        CategoricalField::ProductType,
        CategoricalField::ProductCode,
        CategoricalField::Variant,
        CategoricalField::OilType,
        CategoricalField::Region,
        CategoricalField::Country,
        CategoricalField::CustomerSegment,
        CategoricalField::Channel,
        CategoricalField::ApplicationArea,
    ];

    /// Key used in the encoder artifact and in the training data
    pub fn name(&self) -> &'static str {
        match self {
            CategoricalField::ProductType => "product_type",
            CategoricalField::ProductCode => "product_code",
            CategoricalField::Variant => "variant",
            CategoricalField::OilType => "oil_type",
            CategoricalField::Region => "region",
            CategoricalField::Country => "country",
            CategoricalField::CustomerSegment => "customer_segment",
            CategoricalField::Channel => "channel",
            CategoricalField::ApplicationArea => "application_area",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CategoricalField::ProductType => "Product Type",
            CategoricalField::ProductCode => "Product Code",
            CategoricalField::Variant => "Variant",
            CategoricalField::OilType => "Oil Type",
            CategoricalField::Region => "Region",
            CategoricalField::Country => "Country",
            CategoricalField::CustomerSegment => "Customer Segment",
            CategoricalField::Channel => "Sales Channel",
            CategoricalField::ApplicationArea => "Application Area",
        }
    }
}

impl fmt::Display for CategoricalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for CategoricalField {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_lowercase().replace('-', "_");
        CategoricalField::ALL
            .into_iter()
            .find(|f| f.name() == key)
            .ok_or_else(|| ForecastError::Parse(format!("Unknown categorical field: {}", s)))
    }
}

/// A fitted label encoder for one field
#[derive(Debug, Clone)]
pub struct CategoryEncoder {
    field: CategoricalField,
    classes: Vec<String>,
    code_of: HashMap<String, usize>,
}

impl CategoryEncoder {
    /// Build an encoder; codes follow the order of `classes`
    pub fn new(field: CategoricalField, classes: Vec<String>) -> Result<Self> {
        if classes.is_empty() {
            return Err(ForecastError::artifact(
                "label encoders",
                format!("{} has no classes", field),
            ));
        }

        let mut code_of = HashMap::with_capacity(classes.len());
        for (code, class) in classes.iter().enumerate() {
            if code_of.insert(class.clone(), code).is_some() {
                return Err(ForecastError::artifact(
                    "label encoders",
                    format!("{} lists class {:?} twice", field, class),
                ));
            }
        }

        Ok(CategoryEncoder {
            field,
            classes,
            code_of,
        })
    }

    pub fn field(&self) -> CategoricalField {
        self.field
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn encode(&self, value: &str) -> Result<usize> {
        self.code_of
            .get(value)
            .copied()
            .ok_or_else(|| ForecastError::UnknownCategory {
                field: self.field,
                value: value.to_string(),
            })
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }
}

/// A categorical value already checked against its field's classes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryChoice {
    pub field: CategoricalField,
    pub code: usize,
    pub value: String,
}

/// All label encoders the model was trained with
#[derive(Debug, Clone)]
pub struct EncoderRegistry {
    encoders: BTreeMap<CategoricalField, CategoryEncoder>,
}

impl EncoderRegistry {
    /// Build from explicit class lists; every categorical field must be present
    pub fn from_classes(classes: BTreeMap<CategoricalField, Vec<String>>) -> Result<Self> {
        let mut encoders = BTreeMap::new();
        for (field, list) in classes {
            encoders.insert(field, CategoryEncoder::new(field, list)?);
        }

        if let Some(missing) = CategoricalField::ALL
            .iter()
            .find(|f| !encoders.contains_key(*f))
        {
            return Err(ForecastError::artifact(
                "label encoders",
                format!("no encoder for {}", missing),
            ));
        }

        Ok(EncoderRegistry { encoders })
    }

    /// Parse the encoder artifact: `{"product_type": ["...", ...], ...}`
    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(content)
            .map_err(|e| ForecastError::artifact("label encoders", e))?;

        let mut classes = BTreeMap::new();
        for (key, list) in raw {
            match key.parse::<CategoricalField>() {
                Ok(field) => {
                    classes.insert(field, list);
                }
                Err(_) => log::warn!("Ignoring encoder for unused column {:?}", key),
            }
        }

        Self::from_classes(classes)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ForecastError::artifact(path.display(), e))?;
        let registry = Self::from_json_str(&content)?;

        log::info!(
            "Loaded {} label encoders from {}",
            registry.encoders.len(),
            path.display()
        );
        Ok(registry)
    }

    pub fn encoder(&self, field: CategoricalField) -> &CategoryEncoder {
        // from_classes guarantees an entry for every field
        &self.encoders[&field]
    }

    /// Known classes in training order (also the order choices are offered in)
    pub fn classes_of(&self, field: CategoricalField) -> &[String] {
        self.encoder(field).classes()
    }

    pub fn encode(&self, field: CategoricalField, value: &str) -> Result<usize> {
        self.encoder(field).encode(value)
    }

    pub fn choice(&self, field: CategoricalField, value: &str) -> Result<CategoryChoice> {
        let code = self.encode(field, value)?;
        Ok(CategoryChoice {
            field,
            code,
            value: value.to_string(),
        })
    }
}
