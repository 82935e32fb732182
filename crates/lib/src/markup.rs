use crate::record::Document;

pub fn yaml_to_json(yaml: &serde_yaml::Mapping) -> Result<Document, serde_json::Error> {
    serde_json::to_value(yaml).and_then(serde_json::from_value)
}
