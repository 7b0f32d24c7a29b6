//! Doctor command: reachability checks for every configured backend

use colored::*;
use std::sync::Arc;

use crate::embedding::Embedder;
use crate::llm::CompletionService;
use crate::persist::DocumentResource;
use crate::store::{Collection, MemoryStore};

/// Health check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Pass(String),
    Warn(String),
    Fail(String),
}

/// Individual health check
#[derive(Debug)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
}

impl HealthCheck {
    fn new(name: &str, status: HealthStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
        }
    }
}

pub struct Doctor {
    completion: Arc<dyn CompletionService>,
    embedder: Option<Arc<dyn Embedder>>,
    store: Arc<dyn MemoryStore>,
    guidelines: Arc<dyn DocumentResource>,
}

impl Doctor {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        embedder: Option<Arc<dyn Embedder>>,
        store: Arc<dyn MemoryStore>,
        guidelines: Arc<dyn DocumentResource>,
    ) -> Self {
        Self {
            completion,
            embedder,
            store,
            guidelines,
        }
    }

    pub async fn run_diagnostics(&self) -> Vec<HealthCheck> {
        vec![
            self.check_completion().await,
            self.check_embedder().await,
            self.check_store().await,
            self.check_guidelines().await,
        ]
    }

    async fn check_completion(&self) -> HealthCheck {
        let status = match self.completion.health_check().await {
            Ok(true) => HealthStatus::Pass(self.completion.name().to_string()),
            Ok(false) => HealthStatus::Fail(format!("{} not reachable", self.completion.name())),
            Err(e) => HealthStatus::Fail(e.to_string()),
        };
        HealthCheck::new("Completion", status)
    }

    async fn check_embedder(&self) -> HealthCheck {
        let status = match &self.embedder {
            None => HealthStatus::Warn("none configured; lexical retrieval only".to_string()),
            Some(embedder) => match embedder.embed("health check").await {
                Ok(v) if v.len() == embedder.dimension() => HealthStatus::Pass(format!("{} dimensions", v.len())),
                Ok(v) => HealthStatus::Fail(format!(
                    "expected {} dimensions, got {}",
                    embedder.dimension(),
                    v.len()
                )),
                Err(e) => HealthStatus::Fail(e.to_string()),
            },
        };
        HealthCheck::new("Embedder", status)
    }

    async fn check_store(&self) -> HealthCheck {
        let counts = async {
            let conversations = self.store.count(Collection::Conversations).await?;
            let chunks = self.store.count(Collection::Chunks).await?;
            Ok::<_, crate::errors::MemoryError>((conversations, chunks))
        };
        let status = match counts.await {
            Ok((conversations, chunks)) => HealthStatus::Pass(format!(
                "{}: {} conversations, {} chunks",
                self.store.backend_name(),
                conversations,
                chunks
            )),
            Err(e) => HealthStatus::Fail(e.to_string()),
        };
        HealthCheck::new("Memory store", status)
    }

    async fn check_guidelines(&self) -> HealthCheck {
        let status = match self.guidelines.load().await {
            Ok(Some(_)) => HealthStatus::Pass(self.guidelines.describe()),
            Ok(None) => HealthStatus::Warn(format!("{} not written yet", self.guidelines.describe())),
            Err(e) => HealthStatus::Fail(e.to_string()),
        };
        HealthCheck::new("Guidelines", status)
    }

    pub fn display_results(checks: &[HealthCheck]) {
        println!("\nmnemobuddy diagnostics\n");
        println!("{:<16} Status", "Check");
        println!("{}", "=".repeat(50));
        for check in checks {
            let line = match &check.status {
                HealthStatus::Pass(msg) => format!("{} {}", "PASS".green(), msg),
                HealthStatus::Warn(msg) => format!("{} {}", "WARN".yellow(), msg),
                HealthStatus::Fail(msg) => format!("{} {}", "FAIL".red(), msg),
            };
            println!("{:<16} {}", check.name, line);
        }
        println!();
    }

    /// False if any check failed; warnings do not count
    pub fn overall_status(checks: &[HealthCheck]) -> bool {
        !checks.iter().any(|c| matches!(c.status, HealthStatus::Fail(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{MemoryError, Result};
    use crate::persist::FileResource;
    use crate::store::LocalStore;
    use crate::types::Message;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct Down;

    #[async_trait]
    impl CompletionService for Down {
        async fn generate(&self, _messages: &[Message]) -> Result<String> {
            Err(MemoryError::BackendUnavailable("down".into()))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(false)
        }

        fn name(&self) -> &str {
            "down"
        }
    }

    #[tokio::test]
    async fn test_diagnostics_report_failures() {
        let temp = TempDir::new().unwrap();
        let doctor = Doctor::new(
            Arc::new(Down),
            None,
            Arc::new(LocalStore::in_memory(None).unwrap()),
            Arc::new(FileResource::new(temp.path().join("rules.txt"))),
        );

        let checks = doctor.run_diagnostics().await;
        assert_eq!(checks.len(), 4);
        assert!(matches!(checks[0].status, HealthStatus::Fail(_)));
        assert!(matches!(checks[1].status, HealthStatus::Warn(_)));
        assert!(matches!(checks[2].status, HealthStatus::Pass(_)));
        assert!(matches!(checks[3].status, HealthStatus::Warn(_)));
        assert!(!Doctor::overall_status(&checks));
    }

    #[test]
    fn test_overall_status_ignores_warnings() {
        let checks = vec![
            HealthCheck::new("a", HealthStatus::Pass("ok".into())),
            HealthCheck::new("b", HealthStatus::Warn("meh".into())),
        ];
        assert!(Doctor::overall_status(&checks));
    }
}
