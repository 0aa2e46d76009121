use std::io::{BufRead as _, Write as _};

use keabot_client::{ApprovalDecision, ApprovalGateway, ClientError, EventHandler};
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::warn;

/// What to do when the agent asks for approval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ApprovalPolicy {
    /// Prompt on the terminal.
    Ask,
    /// Approve everything.
    Auto,
    /// Reject everything.
    Reject,
}

struct PendingApproval {
    approval_id: String,
    handle: JoinHandle<Result<(), ClientError>>,
}

/// Answers approval requests without blocking the read loop.
pub struct Approver {
    gateway: ApprovalGateway,
    policy: ApprovalPolicy,
    pending: Vec<PendingApproval>,
}

impl Approver {
    pub fn new(gateway: ApprovalGateway, policy: ApprovalPolicy) -> Self {
        Self {
            gateway,
            policy,
            pending: Vec::new(),
        }
    }

    /// Waits for in-flight approval calls and logs the failed ones.
    ///
    /// Terminal prompts nobody answered are abandoned; their ids are returned
    /// so the caller can say how to resolve them later.
    pub async fn settle(self) -> Vec<String> {
        let mut unanswered = Vec::new();
        for pending in self.pending {
            if self.policy == ApprovalPolicy::Ask && !pending.handle.is_finished() {
                pending.handle.abort();
                unanswered.push(pending.approval_id);
                continue;
            }
            match pending.handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(approval_id = %pending.approval_id, error = %err, "approval call failed")
                }
                Err(err) => {
                    warn!(approval_id = %pending.approval_id, error = %err, "approval task failed")
                }
            }
        }
        unanswered
    }
}

impl EventHandler for Approver {
    fn on_approval_required(
        &mut self,
        approval_id: &str,
        tool_name: &str,
        arguments: &Map<String, Value>,
    ) {
        let handle = match self.policy {
            ApprovalPolicy::Auto => self
                .gateway
                .spawn_resolve(approval_id, ApprovalDecision::Approve),
            ApprovalPolicy::Reject => self
                .gateway
                .spawn_resolve(approval_id, ApprovalDecision::Reject),
            ApprovalPolicy::Ask => {
                let gateway = self.gateway.clone();
                let approval_id = approval_id.to_string();
                let question = format!(
                    "\nApprove {tool_name} {}? [y/N] ",
                    Value::Object(arguments.clone())
                );
                tokio::spawn(async move {
                    let decision = tokio::task::spawn_blocking(move || ask(&question))
                        .await
                        .map_err(|e| ClientError::Protocol(format!("approval prompt failed: {e}")))?;
                    gateway.resolve(&approval_id, decision).await
                })
            }
        };
        self.pending.push(PendingApproval {
            approval_id: approval_id.to_string(),
            handle,
        });
    }
}

fn ask(question: &str) -> ApprovalDecision {
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "{question}");
    let _ = stderr.flush();
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return ApprovalDecision::Reject;
    }
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => ApprovalDecision::Approve,
        _ => ApprovalDecision::Reject,
    }
}

/// Human-readable event printer: content on stdout, activity on stderr.
pub struct Printer {
    approver: Approver,
    mid_line: bool,
}

impl Printer {
    pub fn new(approver: Approver) -> Self {
        Self {
            approver,
            mid_line: false,
        }
    }

    pub fn into_approver(self) -> Approver {
        self.approver
    }

    fn activity(&mut self, line: String) {
        if self.mid_line {
            println!();
            self.mid_line = false;
        }
        eprintln!("  · {line}");
    }
}

impl EventHandler for Printer {
    fn on_content(&mut self, text: &str) {
        print!("{text}");
        let _ = std::io::stdout().flush();
        self.mid_line = !text.ends_with('\n');
    }

    fn on_tool_started(&mut self, name: &str, arguments: &Map<String, Value>, is_skill: bool) {
        let kind = if is_skill { "skill" } else { "tool" };
        self.activity(format!("{kind} {name} {}", Value::Object(arguments.clone())));
    }

    fn on_tool_ended(&mut self, name: &str, success: bool, result: &str) {
        let status = if success { "ok" } else { "failed" };
        let preview: String = result.chars().take(120).collect();
        self.activity(format!("{name} {status}: {preview}"));
    }

    fn on_skill_activated(&mut self, name: &str, success: bool) {
        let status = if success { "activated" } else { "failed to activate" };
        self.activity(format!("skill {name} {status}"));
    }

    fn on_approval_required(
        &mut self,
        approval_id: &str,
        tool_name: &str,
        arguments: &Map<String, Value>,
    ) {
        self.activity(format!("approval {approval_id} required for {tool_name}"));
        self.approver
            .on_approval_required(approval_id, tool_name, arguments);
    }

    fn on_completed(
        &mut self,
        visited_files: &[String],
        activated_skills: &[String],
        tool_call_count: u64,
    ) {
        self.activity(format!(
            "done: {tool_call_count} tool calls, {} files visited, {} skills",
            visited_files.len(),
            activated_skills.len()
        ));
    }

    fn on_error(&mut self, message: &str) {
        self.activity(format!("error: {message}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keabot_client::{ClientConfig, KeabotClient};

    fn gateway() -> ApprovalGateway {
        // Nothing listens on the discard port, so calls fail fast.
        KeabotClient::new(ClientConfig::new("http://127.0.0.1:9"))
            .expect("client")
            .approvals()
    }

    #[tokio::test]
    async fn automatic_decisions_are_awaited() {
        let mut approver = Approver::new(gateway(), ApprovalPolicy::Auto);
        approver.on_approval_required("a1", "delete_file", &Map::new());
        approver.on_approval_required("a2", "delete_file", &Map::new());
        assert_eq!(approver.pending.len(), 2);
        assert!(approver.settle().await.is_empty());
    }

    #[tokio::test]
    async fn unanswered_prompts_are_reported() {
        let mut approver = Approver::new(gateway(), ApprovalPolicy::Ask);
        approver.pending.push(PendingApproval {
            approval_id: "a1".into(),
            handle: tokio::spawn(std::future::pending()),
        });
        approver.pending.push(PendingApproval {
            approval_id: "a2".into(),
            handle: tokio::spawn(async { Ok(()) }),
        });
        tokio::task::yield_now().await;
        while !approver.pending[1].handle.is_finished() {
            tokio::task::yield_now().await;
        }
        assert_eq!(approver.settle().await, vec!["a1".to_string()]);
    }
}
