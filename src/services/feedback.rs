// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Feedback wizard: a short survey or a tool suggestion.

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Survey,
    ToolSuggestion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackStep {
    Type,
    Questions { index: usize },
    Tool,
    Thanks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionOption {
    pub value: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Question {
    pub id: &'static str,
    pub prompt: &'static str,
    pub options: [QuestionOption; 4],
}

const fn opt(value: &'static str, label: &'static str) -> QuestionOption {
    QuestionOption { value, label }
}

pub static QUESTIONS: [Question; 4] = [
    Question {
        id: "frequency",
        prompt: "How often do you use AI tools?",
        options: [
            opt("daily", "Every day"),
            opt("weekly", "A few times a week"),
            opt("monthly", "A few times a month"),
            opt("rarely", "Rarely"),
        ],
    },
    Question {
        id: "problem",
        prompt: "What is your biggest problem with AI tools?",
        options: [
            opt("cost", "They cost too much"),
            opt("access", "Hard to pay for from my country"),
            opt("learning", "Hard to learn"),
            opt("quality", "Inconsistent quality"),
        ],
    },
    Question {
        id: "value",
        prompt: "What do you value most about Jall AI?",
        options: [
            opt("price", "Price"),
            opt("payment", "Local payment methods"),
            opt("variety", "Variety of tools"),
            opt("simplicity", "Simplicity"),
        ],
    },
    Question {
        id: "recommend",
        prompt: "Would you recommend Jall AI to a friend?",
        options: [
            opt("definitely", "Definitely"),
            opt("probably", "Probably"),
            opt("not_sure", "Not sure"),
            opt("no", "No"),
        ],
    },
];

/// Minimum non-blank characters in a suggested tool name.
pub const MIN_TOOL_NAME_CHARS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedbackBlocked {
    #[error("Choose what kind of feedback to send")]
    NoKind,
    #[error("Choose an answer")]
    Unanswered,
    #[error("Not an option for this question")]
    UnknownOption,
    #[error("Enter the tool name")]
    ToolNameTooShort,
    #[error("Already at the first step")]
    AtFirstStep,
    #[error("Feedback already sent")]
    Finished,
    #[error("Not available on this step")]
    WrongStep,
}

/// What the sink receives when the wizard completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedbackSubmission {
    Survey {
        answers: BTreeMap<String, String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        comments: Option<String>,
    },
    ToolSuggestion {
        tool_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

/// Toast shown after submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackNotice {
    pub success: bool,
    pub message: String,
}

/// Where completed feedback goes.
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    async fn submit(&self, submission: &FeedbackSubmission) -> Result<()>;
}

/// Writes feedback to the log.
#[derive(Debug, Default)]
pub struct LogFeedbackSink;

#[async_trait]
impl FeedbackSink for LogFeedbackSink {
    async fn submit(&self, submission: &FeedbackSubmission) -> Result<()> {
        let payload = serde_json::to_string(submission)
            .map_err(|e| anyhow::anyhow!("Failed to serialize feedback: {}", e))?;
        tracing::info!(feedback = %payload, "Feedback received");
        Ok(())
    }
}

fn trimmed(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackWizard {
    step: FeedbackStep,
    kind: Option<FeedbackKind>,
    answers: BTreeMap<&'static str, &'static str>,
    comments: String,
    tool_name: String,
    tool_reason: String,
}

impl Default for FeedbackWizard {
    fn default() -> Self {
        Self {
            step: FeedbackStep::Type,
            kind: None,
            answers: BTreeMap::new(),
            comments: String::new(),
            tool_name: String::new(),
            tool_reason: String::new(),
        }
    }
}

impl FeedbackWizard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> FeedbackStep {
        self.step
    }

    pub fn kind(&self) -> Option<FeedbackKind> {
        self.kind
    }

    /// Question shown on the current step, if any.
    pub fn current_question(&self) -> Option<&'static Question> {
        match self.step {
            FeedbackStep::Questions { index } => QUESTIONS.get(index),
            _ => None,
        }
    }

    pub fn answer(&self, question_id: &str) -> Option<&'static str> {
        self.answers.get(question_id).copied()
    }

    /// The comment box only appears on the last question.
    pub fn shows_comments(&self) -> bool {
        self.step
            == FeedbackStep::Questions {
                index: QUESTIONS.len() - 1,
            }
    }

    /// Pick the kind. A different kind discards everything entered so far.
    pub fn set_kind(&mut self, kind: FeedbackKind) -> std::result::Result<(), FeedbackBlocked> {
        if self.step != FeedbackStep::Type {
            return Err(FeedbackBlocked::WrongStep);
        }
        if self.kind != Some(kind) {
            *self = Self {
                kind: Some(kind),
                ..Self::default()
            };
        }
        Ok(())
    }

    pub fn answer_current(&mut self, value: &str) -> std::result::Result<(), FeedbackBlocked> {
        let question = self.current_question().ok_or(FeedbackBlocked::WrongStep)?;
        let option = question
            .options
            .iter()
            .find(|o| o.value == value)
            .ok_or(FeedbackBlocked::UnknownOption)?;
        self.answers.insert(question.id, option.value);
        Ok(())
    }

    pub fn set_comments(&mut self, text: &str) {
        self.comments = text.to_string();
    }

    pub fn set_tool_name(&mut self, text: &str) {
        self.tool_name = text.to_string();
    }

    pub fn set_tool_reason(&mut self, text: &str) {
        self.tool_reason = text.to_string();
    }

    /// Advance. Returns the submission when leaving the last step.
    pub fn next(&mut self) -> std::result::Result<Option<FeedbackSubmission>, FeedbackBlocked> {
        match self.step {
            FeedbackStep::Type => {
                self.step = match self.kind.ok_or(FeedbackBlocked::NoKind)? {
                    FeedbackKind::Survey => FeedbackStep::Questions { index: 0 },
                    FeedbackKind::ToolSuggestion => FeedbackStep::Tool,
                };
                Ok(None)
            }
            FeedbackStep::Questions { index } => {
                let question = QUESTIONS.get(index).ok_or(FeedbackBlocked::WrongStep)?;
                if !self.answers.contains_key(question.id) {
                    return Err(FeedbackBlocked::Unanswered);
                }
                if index + 1 < QUESTIONS.len() {
                    self.step = FeedbackStep::Questions { index: index + 1 };
                    return Ok(None);
                }
                self.step = FeedbackStep::Thanks;
                Ok(Some(FeedbackSubmission::Survey {
                    answers: self
                        .answers
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                    comments: trimmed(&self.comments),
                }))
            }
            FeedbackStep::Tool => {
                let name = self.tool_name.trim();
                if name.chars().count() < MIN_TOOL_NAME_CHARS {
                    return Err(FeedbackBlocked::ToolNameTooShort);
                }
                let submission = FeedbackSubmission::ToolSuggestion {
                    tool_name: name.to_string(),
                    reason: trimmed(&self.tool_reason),
                };
                self.step = FeedbackStep::Thanks;
                Ok(Some(submission))
            }
            FeedbackStep::Thanks => Err(FeedbackBlocked::Finished),
        }
    }

    pub fn back(&mut self) -> std::result::Result<FeedbackStep, FeedbackBlocked> {
        self.step = match self.step {
            FeedbackStep::Type => return Err(FeedbackBlocked::AtFirstStep),
            FeedbackStep::Questions { index: 0 } | FeedbackStep::Tool => FeedbackStep::Type,
            FeedbackStep::Questions { index } => FeedbackStep::Questions { index: index - 1 },
            FeedbackStep::Thanks => return Err(FeedbackBlocked::Finished),
        };
        Ok(self.step)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Feedback dialog bound to a sink.
pub struct FeedbackController {
    sink: Arc<dyn FeedbackSink>,
    wizard: Mutex<FeedbackWizard>,
}

impl FeedbackController {
    pub fn new(sink: Arc<dyn FeedbackSink>) -> Self {
        Self {
            sink,
            wizard: Mutex::new(FeedbackWizard::new()),
        }
    }

    pub async fn set_kind(&self, kind: FeedbackKind) -> std::result::Result<(), FeedbackBlocked> {
        self.wizard.lock().await.set_kind(kind)
    }

    pub async fn answer(&self, value: &str) -> std::result::Result<(), FeedbackBlocked> {
        self.wizard.lock().await.answer_current(value)
    }

    pub async fn set_comments(&self, text: &str) {
        self.wizard.lock().await.set_comments(text);
    }

    pub async fn set_tool(&self, name: &str, reason: &str) {
        let mut wizard = self.wizard.lock().await;
        wizard.set_tool_name(name);
        wizard.set_tool_reason(reason);
    }

    /// Advance; when this completes the wizard, submit once and report.
    pub async fn next(&self) -> std::result::Result<Option<FeedbackNotice>, FeedbackBlocked> {
        let submission = self.wizard.lock().await.next()?;
        let Some(submission) = submission else {
            return Ok(None);
        };

        let notice = match self.sink.submit(&submission).await {
            Ok(()) => FeedbackNotice {
                success: true,
                message: "Thanks for your feedback!".to_string(),
            },
            Err(e) => {
                tracing::warn!(error = %e, "Feedback submission failed");
                FeedbackNotice {
                    success: false,
                    message: "Your feedback could not be sent".to_string(),
                }
            }
        };
        Ok(Some(notice))
    }

    pub async fn back(&self) -> std::result::Result<FeedbackStep, FeedbackBlocked> {
        self.wizard.lock().await.back()
    }

    pub async fn close(&self) {
        self.wizard.lock().await.reset();
    }

    pub async fn state(&self) -> FeedbackWizard {
        self.wizard.lock().await.clone()
    }
}
