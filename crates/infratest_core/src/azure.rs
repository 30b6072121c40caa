//! Azure CLI queries used by the backend and environment checks.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use infratest_runner::{CommandRunner, CommandSpec, ExecutionResult};

/// Why a structured query produced no document.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFailure {
    /// The CLI exited non-zero; holds its stderr.
    Command(String),
    /// The CLI succeeded but stdout was not valid JSON; holds the parse error.
    Parse(String),
}

/// Thin wrapper around the `az` command line.
#[derive(Clone)]
pub struct AzureCli {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl AzureCli {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: "az".to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// `az group show --name <name>`
    pub async fn group_show(&self, name: &str) -> ExecutionResult {
        info!("Checking resource group {}", name);
        self.run(["group", "show", "--name", name]).await
    }

    /// `az group list --output json`, optionally filtered by `tag=value`.
    pub async fn group_list(&self, tag: Option<(&str, &str)>) -> Result<Value, QueryFailure> {
        let mut args = vec!["group".to_string(), "list".to_string()];
        if let Some((key, value)) = tag {
            args.push("--tag".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.extend(["--output".to_string(), "json".to_string()]);
        let execution = self.run(args).await;
        Self::parse(execution)
    }

    /// `az storage account show`, optionally narrowed by `--query`.
    pub async fn storage_account_show(
        &self,
        account: &str,
        resource_group: &str,
        query: Option<&str>,
    ) -> Result<Value, QueryFailure> {
        let mut args = vec![
            "storage",
            "account",
            "show",
            "--name",
            account,
            "--resource-group",
            resource_group,
        ];
        if let Some(query) = query {
            args.extend(["--query", query]);
        }
        let execution = self.run(args).await;
        Self::parse(execution)
    }

    /// `az storage container list --account-name <account> --auth-mode login`
    pub async fn container_list(&self, account: &str) -> Result<Value, QueryFailure> {
        let execution = self
            .run([
                "storage",
                "container",
                "list",
                "--account-name",
                account,
                "--auth-mode",
                "login",
            ])
            .await;
        Self::parse(execution)
    }

    async fn run<I, S>(&self, args: I) -> ExecutionResult
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = CommandSpec::new(&self.program).args(args);
        debug!("az query: {}", spec);
        self.runner.run(&spec).await
    }

    fn parse(execution: ExecutionResult) -> Result<Value, QueryFailure> {
        if !execution.success() {
            return Err(QueryFailure::Command(execution.stderr));
        }
        execution
            .stdout_json()
            .map_err(|e| QueryFailure::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infratest_runner::{MockResponse, MockRunner};

    #[tokio::test]
    async fn test_group_list_with_tag() {
        let mock = MockRunner::new().on(
            "az",
            &["group", "list"],
            MockResponse::success(r#"[{"name": "rg-prod"}]"#),
        );
        let az = AzureCli::new(Arc::new(mock.clone()));

        let groups = az.group_list(Some(("environment", "prod"))).await.unwrap();

        assert_eq!(groups[0]["name"], "rg-prod");
        let call = &mock.calls_to("az", &["group", "list"])[0];
        assert_eq!(
            call.args,
            vec!["group", "list", "--tag", "environment=prod", "--output", "json"]
        );
    }

    #[tokio::test]
    async fn test_command_and_parse_failures_are_distinct() {
        let mock = MockRunner::new()
            .on("az", &["storage", "account"], MockResponse::failure(3, "ResourceNotFound"))
            .on("az", &["storage", "container"], MockResponse::success("<html>login</html>"));
        let az = AzureCli::new(Arc::new(mock));

        let account = az.storage_account_show("sa", "rg", Some("encryption")).await;
        assert_eq!(account, Err(QueryFailure::Command("ResourceNotFound".to_string())));

        let containers = az.container_list("sa").await;
        assert!(matches!(containers, Err(QueryFailure::Parse(_))));
    }

    #[tokio::test]
    async fn test_storage_query_argument() {
        let mock = MockRunner::new().with_default(MockResponse::success("{}"));
        let az = AzureCli::new(Arc::new(mock.clone())).with_program("az2");

        az.storage_account_show("tfstate1", "state-rg", Some("networkRuleSet"))
            .await
            .unwrap();

        let calls = mock.get_calls();
        assert_eq!(calls[0].program, "az2");
        assert_eq!(
            calls[0].args,
            vec![
                "storage",
                "account",
                "show",
                "--name",
                "tfstate1",
                "--resource-group",
                "state-rg",
                "--query",
                "networkRuleSet"
            ]
        );
    }
}
