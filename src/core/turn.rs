//! 回合控制器：两个人格同时改写，全有或全无
//!
//! 一轮流程：
//! 1. 首条消息开启新话题：记录话题、生成 generation id、清零修复计数
//! 2. 用户消息追加到两条线程，两个生成调用并发执行
//! 3. 任一失败：两条线程都截断回本轮之前，返回第一个失败（按人格顺序）
//! 4. 全部成功：追加 model 消息，两张图并发 settle（各自独占自己的线程）

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use uuid::Uuid;

use crate::core::coordinator::DiagramCoordinator;
use crate::core::error::DuetError;
use crate::core::state::{DiagramOutcome, PersonaThread};
use crate::memory::Message;
use crate::persona::Persona;
use crate::rewrite::{RewriteResult, RewriteService};

/// 单个人格在本轮的结果
#[derive(Debug, Clone)]
pub struct PersonaReply {
    pub persona: Persona,
    pub message_id: Uuid,
    pub rewrite: String,
    pub outcome: DiagramOutcome,
}

/// 一轮的结果（按人格顺序）
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub generation_id: String,
    pub replies: Vec<PersonaReply>,
}

impl TurnReport {
    pub fn reply(&self, persona: Persona) -> Option<&PersonaReply> {
        self.replies.iter().find(|r| r.persona == persona)
    }
}

/// 本地时间 yyMMddHHmmss
pub fn new_generation_id() -> String {
    chrono::Local::now().format("%y%m%d%H%M%S").to_string()
}

pub struct TurnController {
    service: Arc<RewriteService>,
    coordinator: DiagramCoordinator,
    threads: BTreeMap<Persona, PersonaThread>,
    topic: Option<String>,
    generation_id: Option<String>,
}

impl TurnController {
    pub fn new(service: Arc<RewriteService>, coordinator: DiagramCoordinator) -> Self {
        let threads = Persona::ALL
            .iter()
            .map(|p| (*p, PersonaThread::new(*p)))
            .collect();
        Self {
            service,
            coordinator,
            threads,
            topic: None,
            generation_id: None,
        }
    }

    pub fn thread(&self, persona: Persona) -> Option<&PersonaThread> {
        self.threads.get(&persona)
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn generation_id(&self) -> Option<&str> {
        self.generation_id.as_deref()
    }

    pub fn coordinator(&self) -> &DiagramCoordinator {
        &self.coordinator
    }

    pub fn is_empty(&self) -> bool {
        self.threads.values().all(|t| t.conversation.is_empty())
    }

    /// 清空两条线程，下一条消息开启新话题
    pub fn start_new_topic(&mut self) {
        for thread in self.threads.values_mut() {
            thread.reset();
        }
        self.topic = None;
        self.generation_id = None;
        tracing::info!("Started a new topic");
    }

    pub async fn send(&mut self, text: &str) -> Result<TurnReport, DuetError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DuetError::EmptyInput);
        }

        if self.is_empty() {
            self.start_new_topic();
            self.topic = Some(text.to_string());
            self.generation_id = Some(new_generation_id());
        }
        let generation_id = self.generation_id.clone().unwrap_or_else(new_generation_id);

        let base_lens: BTreeMap<Persona, usize> = self
            .threads
            .iter()
            .map(|(p, t)| (*p, t.conversation.len()))
            .collect();
        for thread in self.threads.values_mut() {
            thread.conversation.push(Message::user(text));
        }

        tracing::info!(generation_id = %generation_id, "Generating twin rewrites");
        let results = {
            let service = &self.service;
            let calls = self.threads.values().map(|thread| {
                let base = base_lens.get(&thread.persona).copied().unwrap_or(0);
                let history = &thread.conversation.messages()[..base];
                let persona = thread.persona;
                async move { (persona, service.generate(history, text, persona).await) }
            });
            join_all(calls).await
        };

        let mut generated: Vec<(Persona, RewriteResult)> = Vec::with_capacity(results.len());
        let mut first_error = None;
        for (persona, result) in results {
            match result {
                Ok(r) => generated.push((persona, r)),
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(e) => tracing::error!("Additional failure for {}: {}", persona, e),
            }
        }

        if let Some(err) = first_error {
            for (persona, thread) in self.threads.iter_mut() {
                thread.conversation.truncate(base_lens.get(persona).copied().unwrap_or(0));
            }
            if self.is_empty() {
                self.topic = None;
                self.generation_id = None;
            }
            tracing::info!("Turn rolled back: {}", err);
            return Err(DuetError::from_rewrite(err));
        }

        let mut ids: BTreeMap<Persona, (Uuid, String)> = BTreeMap::new();
        for (persona, result) in generated {
            let Some(thread) = self.threads.get_mut(&persona) else {
                continue;
            };
            let diagram = (!result.diagram_source.is_empty()).then_some(result.diagram_source);
            let id = thread
                .conversation
                .push(Message::model(result.rewrite.clone(), diagram));
            ids.insert(persona, (id, result.rewrite));
        }

        let topic = self.topic.clone().unwrap_or_else(|| text.to_string());
        let coordinator = &self.coordinator;
        let settles = self.threads.iter_mut().filter_map(|(persona, thread)| {
            let (id, rewrite) = ids.get(persona)?.clone();
            let topic = topic.as_str();
            Some(async move {
                let outcome = coordinator.settle(topic, thread, id).await;
                PersonaReply {
                    persona: thread.persona,
                    message_id: id,
                    rewrite,
                    outcome,
                }
            })
        });
        let replies = join_all(settles).await;

        tracing::info!(generation_id = %generation_id, "Turn complete");
        Ok(TurnReport {
            generation_id,
            replies,
        })
    }

    /// 重新 settle 某人格最近一条 model 消息的图（前端刷新用）
    pub async fn rerender(&mut self, persona: Persona) -> Option<DiagramOutcome> {
        let topic = self.topic.clone().unwrap_or_default();
        let thread = self.threads.get_mut(&persona)?;
        let id = thread.conversation.last_model()?.id;
        Some(self.coordinator.settle(&topic, thread, id).await)
    }
}
