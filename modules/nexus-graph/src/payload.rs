//! Permissive intermediate representation of producer output.
//!
//! Producers return loosely-shaped JSON. Everything here is lifted
//! field-by-field from `serde_json::Value`: a record with a wrong type in one
//! field loses that field, a record that cannot be read at all is skipped, and
//! the rest of the response survives. Nothing in this module decides what is
//! admitted to the graph; that happens in `evidence` and `merge`.

use serde_json::{Map, Value};

use nexus_common::EntityRole;

/// Optional scalar entity attributes, by wire name.
pub const SCALAR_FIELDS: &[&str] = &[
    "country",
    "note",
    "ticker",
    "primaryExchange",
    "sector",
    "industry",
    "sizeBucket",
    "growthProfile",
    "riskNotes",
    "latestPrice",
    "marketCap",
    "revenue",
    "netIncome",
    "layer",
];

#[derive(Debug, Clone, PartialEq)]
pub struct RawEntity {
    pub id: Option<String>,
    pub name: Option<String>,
    pub role: EntityRole,
    /// (wire name, value) for every populated scalar in `SCALAR_FIELDS`.
    pub scalars: Vec<(String, String)>,
    pub key_themes: Vec<String>,
}

impl RawEntity {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            role: EntityRole::Other,
            scalars: Vec::new(),
            key_themes: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_role(mut self, role: EntityRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_scalar(mut self, field: &str, value: impl Into<String>) -> Self {
        self.scalars.push((field.to_string(), value.into()));
        self
    }

    pub fn scalar(&self, field: &str) -> Option<&str> {
        self.scalars
            .iter()
            .find(|(k, _)| k == field)
            .map(|(_, v)| v.as_str())
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => non_empty(s).map(RawEntity::named),
            Value::Object(obj) => {
                let id = string_field(obj, "id");
                let name = string_field(obj, "name").or_else(|| string_field(obj, "displayName"));
                if id.is_none() && name.is_none() {
                    return None;
                }
                let role = string_field(obj, "role")
                    .map(|r| EntityRole::parse_loose(&r))
                    .unwrap_or(EntityRole::Other);
                let scalars = SCALAR_FIELDS
                    .iter()
                    .filter_map(|field| string_field(obj, field).map(|v| (field.to_string(), v)))
                    .collect();
                Some(Self {
                    id,
                    name,
                    role,
                    scalars,
                    key_themes: themes_field(obj.get("keyThemes")),
                })
            }
            _ => None,
        }
    }
}

/// A relationship endpoint as the producer wrote it: a bare string, or an
/// object carrying `id` and/or `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEndpoint {
    Name(String),
    Object {
        id: Option<String>,
        name: Option<String>,
    },
}

impl RawEndpoint {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => non_empty(s).map(RawEndpoint::Name),
            Value::Object(obj) => {
                let id = string_field(obj, "id");
                let name = string_field(obj, "name");
                if id.is_none() && name.is_none() {
                    None
                } else {
                    Some(RawEndpoint::Object { id, name })
                }
            }
            _ => None,
        }
    }

    /// Raw strings to try, in preference order.
    pub fn candidates(&self) -> Vec<&str> {
        match self {
            RawEndpoint::Name(s) => vec![s.as_str()],
            RawEndpoint::Object { id, name } => {
                id.iter().chain(name.iter()).map(|s| s.as_str()).collect()
            }
        }
    }
}

impl From<&str> for RawEndpoint {
    fn from(s: &str) -> Self {
        RawEndpoint::Name(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawLink {
    pub source: Option<RawEndpoint>,
    pub target: Option<RawEndpoint>,
    pub rel_type: Option<String>,
    pub description: Option<String>,
    pub materiality: Option<String>,
    pub dependency_direction: Option<String>,
    pub evidence_strength: Option<String>,
    pub is_key_relationship: Option<bool>,
    /// Producer-local citation ids until the ledger remaps them.
    pub evidence_ids: Vec<u64>,
}

impl RawLink {
    pub fn new(source: &str, target: &str, rel_type: &str, evidence_ids: Vec<u64>) -> Self {
        Self {
            source: Some(source.into()),
            target: Some(target.into()),
            rel_type: Some(rel_type.to_string()),
            description: None,
            materiality: None,
            dependency_direction: None,
            evidence_strength: None,
            is_key_relationship: None,
            evidence_ids,
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            source: obj.get("source").and_then(RawEndpoint::from_value),
            target: obj.get("target").and_then(RawEndpoint::from_value),
            rel_type: string_field(obj, "type"),
            description: string_field(obj, "description"),
            materiality: string_field(obj, "materiality"),
            dependency_direction: string_field(obj, "dependencyDirection"),
            evidence_strength: string_field(obj, "evidenceStrength"),
            is_key_relationship: obj.get("isKeyRelationship").and_then(Value::as_bool),
            evidence_ids: id_list(obj.get("sourceIds").or_else(|| obj.get("evidenceIds"))),
        })
    }

    /// Source, target and type are all present.
    pub fn is_well_formed(&self) -> bool {
        self.source.is_some() && self.target.is_some() && self.rel_type.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawCitation {
    /// `None` when the producer gave no usable numeric id.
    pub id: Option<u64>,
    pub title: String,
    pub url: Option<String>,
    pub note: Option<String>,
}

impl RawCitation {
    pub fn new(id: u64, title: &str, url: &str) -> Self {
        Self {
            id: Some(id),
            title: title.to_string(),
            url: Some(url.to_string()),
            note: None,
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            // Title-only citations carry no URL; the ledger will drop them.
            Value::String(s) => Some(Self {
                id: None,
                title: s.clone(),
                url: None,
                note: None,
            }),
            Value::Object(obj) => Some(Self {
                id: obj.get("id").and_then(as_id),
                title: string_field(obj, "title").unwrap_or_default(),
                url: string_field(obj, "url"),
                note: string_field(obj, "note"),
            }),
            _ => None,
        }
    }
}

/// One parsed producer response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProducerPayload {
    pub nodes: Vec<RawEntity>,
    pub links: Vec<RawLink>,
    pub sources: Vec<RawCitation>,
    pub queries: Vec<String>,
}

impl ProducerPayload {
    /// Parse raw producer text. `None` when no JSON object can be recovered.
    pub fn parse(text: &str) -> Option<Self> {
        let value = ai_client::util::parse_json_lenient(text)?;
        value.as_object()?;
        Some(Self::from_value(&value))
    }

    pub fn from_value(value: &Value) -> Self {
        Self {
            nodes: array_of(value.get("nodes"), RawEntity::from_value),
            links: array_of(value.get("links"), RawLink::from_value),
            sources: array_of(value.get("sources"), RawCitation::from_value),
            queries: array_of(value.get("queries"), |v| v.as_str().map(str::to_string)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty() && self.sources.is_empty()
    }
}

// --- Field helpers ---

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// String-ish field: strings are trimmed, numbers and bools are rendered.
fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn themes_field(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().and_then(non_empty))
            .collect(),
        Some(Value::String(s)) => s.split(',').filter_map(non_empty).collect(),
        _ => Vec::new(),
    }
}

fn as_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn id_list(value: Option<&Value>) -> Vec<u64> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(as_id).collect(),
        Some(single) => as_id(single).into_iter().collect(),
        None => Vec::new(),
    }
}

fn array_of<T>(value: Option<&Value>, lift: impl Fn(&Value) -> Option<T>) -> Vec<T> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(lift).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_response() {
        let text = r#"{
            "queries": ["nvidia suppliers 2024"],
            "sources": [{"id": 1, "title": "Reuters", "url": "https://reuters.com/x", "note": "Reuters 2024-05"}],
            "links": [{"source": "NVIDIA", "target": "TSMC", "type": "SupplyChain", "sourceIds": [1]}],
            "nodes": [{"id": "NVIDIA", "name": "NVIDIA", "role": "Core", "country": "US"}]
        }"#;
        let payload = ProducerPayload::parse(text).unwrap();
        assert_eq!(payload.nodes.len(), 1);
        assert_eq!(payload.nodes[0].role, EntityRole::Core);
        assert_eq!(payload.nodes[0].scalar("country"), Some("US"));
        assert_eq!(payload.links[0].evidence_ids, vec![1]);
        assert_eq!(payload.sources[0].note.as_deref(), Some("Reuters 2024-05"));
        assert_eq!(payload.queries.len(), 1);
    }

    #[test]
    fn malformed_records_are_skipped_not_fatal() {
        let value = json!({
            "nodes": [42, {"role": "Core"}, {"name": "TSMC"}],
            "links": ["not a link", {"source": "A", "target": "B"}],
            "sources": [null, "Bloomberg article"]
        });
        let payload = ProducerPayload::from_value(&value);
        assert_eq!(payload.nodes.len(), 1);
        assert_eq!(payload.links.len(), 1);
        assert!(!payload.links[0].is_well_formed());
        assert_eq!(payload.sources.len(), 1);
        assert!(payload.sources[0].url.is_none());
    }

    #[test]
    fn evidence_ids_accept_strings_floats_and_alias() {
        let link = RawLink::from_value(&json!({
            "source": "A", "target": "B", "type": "Partner",
            "evidenceIds": ["2", 3.0, -1, "x", 4]
        }))
        .unwrap();
        assert_eq!(link.evidence_ids, vec![2, 3, 4]);

        let single = RawLink::from_value(&json!({"source": "A", "target": "B", "type": "Partner", "sourceIds": 7}))
            .unwrap();
        assert_eq!(single.evidence_ids, vec![7]);
    }

    #[test]
    fn object_endpoints_keep_id_and_name() {
        let link = RawLink::from_value(&json!({
            "source": {"id": "nvda", "name": "NVIDIA"},
            "target": "TSMC",
            "type": "SupplyChain"
        }))
        .unwrap();
        let source = link.source.unwrap();
        assert_eq!(source.candidates(), vec!["nvda", "NVIDIA"]);
    }

    #[test]
    fn themes_accept_comma_string() {
        let entity = RawEntity::from_value(&json!({"name": "AMD", "keyThemes": "AI, Data Center ,"})).unwrap();
        assert_eq!(entity.key_themes, vec!["AI", "Data Center"]);
    }

    #[test]
    fn non_object_response_is_none() {
        assert!(ProducerPayload::parse("[1, 2, 3]").is_none());
        assert!(ProducerPayload::parse("sorry, I cannot help").is_none());
        assert!(ProducerPayload::parse("").is_none());
    }

    #[test]
    fn empty_object_is_empty_payload() {
        let payload = ProducerPayload::parse("{}").unwrap();
        assert!(payload.is_empty());
    }
}
