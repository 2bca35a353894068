//! 流水线运行上下文采集
//!
//! 从 CI 注入的 `GITHUB_*` 环境变量中读取当前运行信息，随版本号一起持久化，
//! 便于追溯每个版本号由哪次运行产生。

use tracing::info;

use crate::models::RunContext;

impl RunContext {
    /// 从进程环境变量读取；不在 CI 中（没有 `GITHUB_RUN_ID`）时返回 None
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 通过任意查找函数读取变量，便于测试注入
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let run_id = lookup("GITHUB_RUN_ID")?.trim().parse().ok()?;
        let var = |name: &str| lookup(name).unwrap_or_default();

        let (organization, repository) = split_repository(&var("GITHUB_REPOSITORY"));

        Some(Self {
            event_name: var("GITHUB_EVENT_NAME"),
            sha: var("GITHUB_SHA"),
            git_ref: var("GITHUB_REF"),
            actor: var("GITHUB_ACTOR"),
            run_number: var("GITHUB_RUN_NUMBER").trim().parse().unwrap_or(0),
            run_id,
            workflow: var("GITHUB_WORKFLOW"),
            repository,
            organization,
        })
    }
}

/// `owner/repo` 拆分为 (owner, repo)
fn split_repository(full_name: &str) -> (String, String) {
    match full_name.split_once('/') {
        Some((owner, repo)) => (owner.to_string(), repo.to_string()),
        None => (String::new(), full_name.to_string()),
    }
}

/// 输出运行上下文日志
pub fn log_context(context: Option<&RunContext>) {
    match context {
        Some(ctx) => info!(
            actor = %ctx.actor,
            git_ref = %ctx.git_ref,
            sha = %ctx.sha,
            run_id = ctx.run_id,
            run_number = ctx.run_number,
            event_name = %ctx.event_name,
            workflow = %ctx.workflow,
            repository = %ctx.repository,
            organization = %ctx.organization,
            "Run context"
        ),
        None => info!("No run context available"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &HashMap<&str, &str>) -> impl Fn(&str) -> Option<String> {
        move |name| vars.get(name).map(|v| v.to_string())
    }

    #[test]
    fn test_from_lookup_reads_github_variables() {
        let vars = HashMap::from([
            ("GITHUB_RUN_ID", "9001"),
            ("GITHUB_RUN_NUMBER", "42"),
            ("GITHUB_EVENT_NAME", "push"),
            ("GITHUB_SHA", "abc123"),
            ("GITHUB_REF", "refs/heads/main"),
            ("GITHUB_ACTOR", "octocat"),
            ("GITHUB_WORKFLOW", "release"),
            ("GITHUB_REPOSITORY", "acme/mobile"),
        ]);

        let ctx = RunContext::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(ctx.run_id, 9001);
        assert_eq!(ctx.run_number, 42);
        assert_eq!(ctx.organization, "acme");
        assert_eq!(ctx.repository, "mobile");
        assert_eq!(ctx.git_ref, "refs/heads/main");
    }

    #[test]
    fn test_from_lookup_outside_ci() {
        let vars = HashMap::from([("GITHUB_SHA", "abc123")]);
        assert!(RunContext::from_lookup(lookup(&vars)).is_none());

        let vars = HashMap::from([("GITHUB_RUN_ID", "not-a-number")]);
        assert!(RunContext::from_lookup(lookup(&vars)).is_none());
    }

    #[test]
    fn test_missing_optional_fields_default_to_empty() {
        let vars = HashMap::from([("GITHUB_RUN_ID", "7")]);
        let ctx = RunContext::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(ctx.run_number, 0);
        assert!(ctx.actor.is_empty());
        assert!(ctx.repository.is_empty());
    }

    #[test]
    fn test_split_repository() {
        assert_eq!(
            split_repository("acme/mobile"),
            ("acme".to_string(), "mobile".to_string())
        );
        assert_eq!(split_repository("mobile"), (String::new(), "mobile".to_string()));
    }
}
