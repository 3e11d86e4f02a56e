//! Event dispatcher: routes decoded push events to store mutations.
//!
//! The routing is scoped by the currently open conversation, which the
//! dispatcher reads from the leads store on every call. It holds no other
//! state between events.

use std::sync::Arc;

use chrono::Utc;

use crate::api::ApiClient;
use crate::events::ServerEvent;
use crate::notify::{Notification, Notifier};
use crate::store::{ChatStore, LeadsStore};
use crate::types::{ConversationMessage, PendingResponse, PendingStatus, Sender};

pub struct Dispatcher {
    api: Arc<ApiClient>,
    notifier: Arc<dyn Notifier>,
}

impl Dispatcher {
    pub fn new(api: Arc<ApiClient>, notifier: Arc<dyn Notifier>) -> Self {
        Self { api, notifier }
    }

    /// Decode one raw transport payload and apply it. Non-JSON payloads and
    /// payloads without a recognizable shape are dropped here; they must
    /// never reach the stores or crash the channel.
    pub async fn dispatch_raw(&self, raw: &str, leads: &mut LeadsStore, chat: &mut ChatStore) {
        let event: ServerEvent = match serde_json::from_str(raw) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!("discarding malformed push payload: {e}");
                return;
            }
        };
        self.dispatch(event, leads, chat).await;
    }

    pub async fn dispatch(&self, event: ServerEvent, leads: &mut LeadsStore, chat: &mut ChatStore) {
        match event {
            ServerEvent::Connected => {}

            ServerEvent::PendingResponse {
                pending_id,
                lead_id,
                lead_name,
                phone,
                user_message,
                ai_response,
                agent_used,
                lead_state,
            } => {
                let label = if lead_name.is_empty() {
                    phone.clone()
                } else {
                    lead_name.clone()
                };
                chat.upsert_pending(PendingResponse {
                    id: pending_id,
                    lead_id,
                    lead_name,
                    lead_phone: phone,
                    lead_channel_id: None,
                    user_message,
                    ai_response,
                    edited_response: None,
                    agent_used,
                    lead_state,
                    status: PendingStatus::Pending,
                    reviewed_by: None,
                    created_at: Utc::now().to_rfc3339(),
                    reviewed_at: None,
                });
                chat.set_typing(false);
                self.notifier
                    .notify(Notification::info("AI response drafted").with_body(label));
                leads.refresh_stats(&self.api).await;
            }

            ServerEvent::ResponseReviewed {
                pending_id,
                action,
                phone,
                ..
            } => {
                if action == "rejected" {
                    chat.set_pending_status(&pending_id, PendingStatus::Rejected);
                } else {
                    chat.remove_pending(&pending_id);
                    if let Some(phone) = phone {
                        if leads.is_selected(&phone) {
                            chat.refresh_chat(&self.api, &phone).await;
                        }
                    }
                }
                leads.refresh_stats(&self.api).await;
            }

            ServerEvent::NewMessage {
                phone,
                sender,
                message,
                agent_used,
            } => {
                if leads.is_selected(&phone) {
                    chat.push_message(ConversationMessage {
                        sender,
                        message,
                        agent_name: agent_used,
                        timestamp: Utc::now().to_rfc3339(),
                        state: None,
                    });
                }
                // Unconditional: the list reorders on last interaction.
                leads.refresh_leads(&self.api).await;
            }

            ServerEvent::NewLead => {
                leads.refresh_leads(&self.api).await;
                leads.refresh_stats(&self.api).await;
            }

            ServerEvent::LeadDeleted { phone } => {
                if leads.remove_lead(&phone) {
                    chat.clear();
                }
                leads.refresh_stats(&self.api).await;
            }

            ServerEvent::LeadUpdated { phone } => {
                leads.update_lead_in_list(&self.api, &phone).await;
                leads.refresh_stats(&self.api).await;
            }

            ServerEvent::MeetingBooked {
                phone,
                teams_join_url,
            } => {
                if leads.is_selected(&phone) {
                    let message = match &teams_join_url {
                        Some(url) => format!("Meeting booked! Link: {url}"),
                        None => "Meeting booked!".to_string(),
                    };
                    chat.push_message(system_message(message));
                }
                self.notifier
                    .notify(Notification::success("Meeting booked"));
                leads.refresh_stats(&self.api).await;
            }

            ServerEvent::ProcessingError { phone, error } => {
                chat.set_typing(false);
                if leads.is_selected(&phone) {
                    chat.push_message(system_message(format!("Error: {error}")));
                }
                self.notifier
                    .notify(Notification::error("Processing failed").with_body(error));
            }

            ServerEvent::Unknown => {
                tracing::debug!("ignoring unrecognized push event");
            }
        }
    }
}

fn system_message(message: String) -> ConversationMessage {
    ConversationMessage {
        sender: Sender::System,
        message,
        agent_name: "system".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        state: None,
    }
}
