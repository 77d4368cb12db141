//! Deterministic agent for tests and local runs without a provider key.
//!
//! Walks the domains in order, asking a fixed set of questions per domain.

use super::{AgentError, AgentReply, ConversationAgent};
use crate::models::{
    Confidence, Domain, KeyFinding, Message, MessageRole, NextStep, Risk, Session, SnapshotReport,
    Strength, ValidationItem,
};
use async_trait::async_trait;

const QUESTIONS: [[&str; 3]; 5] = [
    [
        "Who is your target customer, and what problem are you solving for them?",
        "How large is that market, and how did you size it?",
        "Who else is solving this problem today?",
    ],
    [
        "What does your product do today, and what stage is it at?",
        "What evidence do you have that customers want it?",
        "What is on the roadmap for the next six months?",
    ],
    [
        "How will customers find out about you?",
        "What is your pricing model?",
        "What does your sales process look like?",
    ],
    [
        "Who is on the team, and what gaps do you have?",
        "Which processes or suppliers does the business depend on?",
        "What would break first if demand doubled?",
    ],
    [
        "What are your current revenue and monthly costs?",
        "How much runway do you have?",
        "How are you planning to fund the next stage?",
    ],
];

pub struct ScriptedAgent {
    turns_per_domain: usize,
}

impl Default for ScriptedAgent {
    fn default() -> Self {
        Self::new(3)
    }
}

impl ScriptedAgent {
    pub fn new(turns_per_domain: usize) -> Self {
        Self {
            turns_per_domain: turns_per_domain.max(1),
        }
    }

    fn domain_index_after(&self, user_turns: usize) -> usize {
        (user_turns / self.turns_per_domain).min(Domain::ALL.len() - 1)
    }

    fn question(&self, domain_index: usize, user_turns: usize) -> &'static str {
        let within = user_turns % self.turns_per_domain;
        QUESTIONS[domain_index][within.min(QUESTIONS[domain_index].len() - 1)]
    }

    /// User answers grouped by the domain they were given in.
    fn answers_by_domain<'a>(&self, history: &'a [Message]) -> Vec<Vec<&'a str>> {
        let mut grouped = vec![Vec::new(); Domain::ALL.len()];
        let answers = history.iter().filter(|m| m.role == MessageRole::User);
        for (turn, message) in answers.enumerate() {
            grouped[self.domain_index_after(turn)].push(message.content.as_str());
        }
        grouped
    }
}

fn excerpt(text: &str) -> String {
    const MAX_CHARS: usize = 120;
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX_CHARS).collect();
        format!("{}...", cut.trim_end())
    }
}

#[async_trait]
impl ConversationAgent for ScriptedAgent {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn welcome_message(&self, session: &Session) -> Result<String, AgentError> {
        let domain = session.current_domain;
        let index = Domain::ALL.iter().position(|d| *d == domain).unwrap_or(0);
        Ok(format!(
            "Welcome to the Atlas Readiness Guide. We will work through five areas of your \
             business: market, product, go-to-market, operations and financials. \
             Let's start with {}. {}",
            domain.label(),
            QUESTIONS[index][0]
        ))
    }

    async fn respond(
        &self,
        session: &Session,
        history: &[Message],
    ) -> Result<AgentReply, AgentError> {
        let user_turns = history
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .count();
        if user_turns == 0 {
            return Err(AgentError::InvalidResponse(
                "No user message to respond to".to_string(),
            ));
        }

        let index = self.domain_index_after(user_turns);
        let domain = Domain::ALL[index];

        let content = if domain != session.current_domain {
            format!(
                "Thanks, that gives me a good picture of {}. Let's move on to {}. {}",
                session.current_domain.label(),
                domain.label(),
                self.question(index, user_turns)
            )
        } else if index == Domain::ALL.len() - 1
            && user_turns >= Domain::ALL.len() * self.turns_per_domain
        {
            "Thanks. We have covered every area; generate your snapshot whenever you are ready."
                .to_string()
        } else {
            format!("Thanks. {}", self.question(index, user_turns))
        };

        Ok(AgentReply {
            content,
            current_domain: domain,
        })
    }

    async fn draft_snapshot(
        &self,
        _session: &Session,
        history: &[Message],
    ) -> Result<SnapshotReport, AgentError> {
        let grouped = self.answers_by_domain(history);
        let mut report = SnapshotReport::default();

        for (domain, answers) in Domain::ALL.iter().copied().zip(grouped.iter()) {
            match answers.last() {
                Some(last) => {
                    let confidence = if answers.len() >= self.turns_per_domain {
                        Confidence::Medium
                    } else {
                        Confidence::Low
                    };
                    report.key_findings.push(KeyFinding {
                        finding: format!("{}: {}", domain.label(), excerpt(last)),
                        domain,
                        confidence,
                    });
                    report.strengths.push(Strength {
                        description: format!(
                            "You could describe your {} position in your own words.",
                            domain.label().to_lowercase()
                        ),
                        domain,
                    });
                    report.validation_items.push(ValidationItem {
                        source_domain: domain,
                        source_topic: None,
                        title: format!("{} assumptions", domain.label()),
                        description: excerpt(answers[0]),
                        validation_step: format!(
                            "Find one external data point that confirms or contradicts your {} answers.",
                            domain.label().to_lowercase()
                        ),
                    });
                }
                None => {
                    report.risks.push(Risk {
                        description: format!("{} was not discussed.", domain.label()),
                        domain,
                    });
                    report.next_steps.push(NextStep {
                        priority: report.next_steps.len() as u32 + 1,
                        action: format!("Work through the {} questions.", domain.label()),
                        rationale: "Uncovered areas are where readiness gaps usually hide."
                            .to_string(),
                        domain,
                    });
                }
            }
        }

        Ok(report.normalized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionStatus;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn session() -> Session {
        let mut s = Session::new("a@b.co".into(), "h".into(), Duration::hours(1));
        s.status = SessionStatus::InProgress;
        s
    }

    fn user_messages(session: &Session, count: usize) -> Vec<Message> {
        (0..count)
            .map(|i| Message {
                id: Uuid::new_v4(),
                session_id: session.id,
                seq: i as i32 + 1,
                role: MessageRole::User,
                content: format!("answer {}", i),
                created_at: Utc::now(),
            })
            .collect()
    }

    #[tokio::test]
    async fn welcome_names_the_first_domain() {
        let text = ScriptedAgent::default()
            .welcome_message(&session())
            .await
            .unwrap();
        assert!(text.contains("Market"));
    }

    #[tokio::test]
    async fn domain_advances_after_enough_answers() {
        let agent = ScriptedAgent::new(2);
        let session = session();

        let reply = agent
            .respond(&session, &user_messages(&session, 1))
            .await
            .unwrap();
        assert_eq!(reply.current_domain, Domain::Market);

        let reply = agent
            .respond(&session, &user_messages(&session, 2))
            .await
            .unwrap();
        assert_eq!(reply.current_domain, Domain::Product);
        assert!(reply.content.contains("Product"));
    }

    #[tokio::test]
    async fn domain_never_goes_past_financials() {
        let agent = ScriptedAgent::new(1);
        let session = session();
        let reply = agent
            .respond(&session, &user_messages(&session, 20))
            .await
            .unwrap();
        assert_eq!(reply.current_domain, Domain::Financials);
    }

    #[tokio::test]
    async fn respond_requires_a_user_message() {
        let err = ScriptedAgent::default()
            .respond(&session(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn snapshot_flags_undiscussed_domains() {
        let agent = ScriptedAgent::new(1);
        let session = session();
        let report = agent
            .draft_snapshot(&session, &user_messages(&session, 2))
            .await
            .unwrap();

        assert_eq!(report.key_findings.len(), 2);
        assert_eq!(report.risks.len(), 3);
        let priorities: Vec<u32> = report.next_steps.iter().map(|s| s.priority).collect();
        assert_eq!(priorities, vec![1, 2, 3]);
        assert_eq!(report.next_steps[0].domain, Domain::Gtm);
    }
}
