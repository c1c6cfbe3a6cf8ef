//! Visit type lookup and search.

use crate::cancellation::{CancellationToken, Outcome};
use crate::client::ChartClient;
use crate::constants::DEFAULT_PAGE_SIZE;
use crate::pagination::{paginate, Page};
use crate::transport::Api;
use crate::ChartResult;
use openmrs::{Results, VisitType};

#[derive(Clone, Debug)]
pub struct VisitTypeService {
    client: ChartClient,
}

impl VisitTypeService {
    pub fn new(client: ChartClient) -> Self {
        Self { client }
    }

    /// All visit types known to the server, in server order.
    pub async fn list_visit_types(
        &self,
        token: &CancellationToken,
    ) -> ChartResult<Outcome<Vec<VisitType>>> {
        let outcome = self.client.get(Api::Rest, "visittype", token).await?;
        outcome.try_map(|response| {
            let list: Results<VisitType> = openmrs::decode(&response.body, "VisitType list")?;
            Ok(list.results)
        })
    }

    /// Visit types matching `term`, one page of [`DEFAULT_PAGE_SIZE`] at a time.
    pub async fn search(
        &self,
        term: &str,
        page: usize,
        token: &CancellationToken,
    ) -> ChartResult<Outcome<Page<VisitType>>> {
        let outcome = self.list_visit_types(token).await?;
        Ok(outcome.map(|types| paginate(filter_visit_types(types, term), page, DEFAULT_PAGE_SIZE)))
    }
}

/// Keep visit types whose display name contains `term`, ignoring case.
///
/// A blank term keeps everything.
pub fn filter_visit_types(types: Vec<VisitType>, term: &str) -> Vec<VisitType> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return types;
    }
    types
        .into_iter()
        .filter(|t| t.display.to_lowercase().contains(&term))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::test_support::{Reply, ScriptedTransport};
    use std::sync::Arc;

    fn visit_type(display: &str) -> VisitType {
        VisitType {
            uuid: display.to_lowercase().replace(' ', "-"),
            display: display.to_owned(),
            name: display.to_owned(),
            description: None,
        }
    }

    #[test]
    fn filters_case_insensitively() {
        let types = vec![
            visit_type("Facility Visit"),
            visit_type("Home Visit"),
            visit_type("Outpatient"),
        ];

        let matched = filter_visit_types(types.clone(), "  VISIT ");
        assert_eq!(matched.len(), 2);
        assert_eq!(filter_visit_types(types.clone(), "").len(), 3);
        assert!(filter_visit_types(types, "telehealth").is_empty());
    }

    #[tokio::test]
    async fn search_filters_then_paginates() {
        let results: Vec<_> = (1..=7)
            .map(|i| serde_json::json!({"uuid": format!("v{i}"), "display": format!("Clinic {i}")}))
            .chain(std::iter::once(
                serde_json::json!({"uuid": "home", "display": "Home Visit"}),
            ))
            .collect();
        let body = serde_json::json!({ "results": results }).to_string();
        let transport = ScriptedTransport::with_replies([Reply::json(200, &body)]);
        let config = CoreConfig::new("http://localhost:8080/openmrs").expect("valid config");
        let service = VisitTypeService::new(ChartClient::new(Arc::new(config), transport.clone()));

        let page = service
            .search("clinic", 2, &CancellationToken::new())
            .await
            .expect("search succeeds")
            .completed()
            .expect("not cancelled");

        assert_eq!(page.total_items, 7);
        assert_eq!(page.total_pages, 2);
        let names: Vec<_> = page.results.iter().map(|t| t.display.as_str()).collect();
        assert_eq!(names, vec!["Clinic 6", "Clinic 7"]);
        assert_eq!(transport.requests()[0].path, "visittype");
    }
}
