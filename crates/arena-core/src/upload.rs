//! Result-upload URL issuance

use crate::error::IssuanceError;
use async_trait::async_trait;
use uuid::Uuid;

/// Issues the URL the server uploads its replay to
#[async_trait]
pub trait UploadUrlIssuer: Send + Sync {
    async fn issue(&self, match_id: Uuid) -> Result<String, IssuanceError>;
}

/// Substitutes the match id into a fixed URL template
#[derive(Debug, Clone)]
pub struct TemplateIssuer {
    template: String,
}

impl TemplateIssuer {
    pub const PLACEHOLDER: &'static str = "{match_id}";

    pub fn new(template: impl Into<String>) -> Result<Self, IssuanceError> {
        let template = template.into();
        if !template.contains(Self::PLACEHOLDER) {
            return Err(IssuanceError(format!(
                "upload url template {template:?} has no {} placeholder",
                Self::PLACEHOLDER
            )));
        }
        Ok(Self { template })
    }
}

#[async_trait]
impl UploadUrlIssuer for TemplateIssuer {
    async fn issue(&self, match_id: Uuid) -> Result<String, IssuanceError> {
        Ok(self.template.replace(Self::PLACEHOLDER, &match_id.to_string()))
    }
}
