//! Visit type wire model (`GET /visittype`).

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct VisitType {
    pub uuid: String,
    pub display: String,
    #[serde(default)]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode, Results};

    #[test]
    fn reads_visit_type_list() {
        let json = br#"{"results": [
            {"uuid": "7b0f5697", "display": "Facility Visit", "name": "Facility Visit", "description": "Patient visits the clinic"},
            {"uuid": "d66e9fe0", "display": "Home Visit"}
        ]}"#;

        let list: Results<VisitType> = decode(json, "VisitType list").expect("decode");
        assert_eq!(list.results.len(), 2);
        assert_eq!(list.results[0].name, "Facility Visit");
        assert_eq!(list.results[1].name, "");
        assert!(list.results[1].description.is_none());
    }
}
