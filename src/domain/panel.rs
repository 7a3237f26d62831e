// Panel domain model
use super::reading::ReadingView;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelSummary {
    pub id: String,
    pub series_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<ReadingView>,
}
