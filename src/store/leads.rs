use crate::api::ApiClient;
use crate::types::{Lead, Stats};

/// Cache of the lead list, the currently selected lead, and funnel stats.
#[derive(Debug, Default)]
pub struct LeadsStore {
    leads: Vec<Lead>,
    selected_phone: Option<String>,
    selected_lead: Option<Lead>,
    stats: Option<Stats>,
}

impl LeadsStore {
    pub fn leads(&self) -> &[Lead] {
        &self.leads
    }

    pub fn selected_phone(&self) -> Option<&str> {
        self.selected_phone.as_deref()
    }

    pub fn selected_lead(&self) -> Option<&Lead> {
        self.selected_lead.as_ref()
    }

    pub fn stats(&self) -> Option<&Stats> {
        self.stats.as_ref()
    }

    pub fn is_selected(&self, phone: &str) -> bool {
        self.selected_phone.as_deref() == Some(phone)
    }

    /// Replace the cached list wholesale with the server's current view.
    pub async fn refresh_leads(&mut self, api: &ApiClient) {
        match api.list_leads().await {
            Ok(leads) => self.leads = leads,
            Err(e) => tracing::debug!("lead list refresh failed: {e}"),
        }
    }

    /// Change the selection. The previous detail record is cleared before the
    /// fetch so a slow response never leaves stale data on screen.
    pub async fn select_lead(&mut self, api: &ApiClient, phone: Option<String>) {
        self.selected_phone = phone.clone();
        self.selected_lead = None;
        let Some(phone) = phone else { return };
        match api.get_lead(&phone).await {
            Ok(lead) => {
                // A later selection change may have superseded this fetch.
                if self.selected_phone.as_deref() == Some(phone.as_str()) {
                    self.selected_lead = Some(lead);
                }
            }
            Err(e) => tracing::debug!("lead detail fetch failed for {phone}: {e}"),
        }
    }

    pub async fn refresh_stats(&mut self, api: &ApiClient) {
        match api.stats().await {
            Ok(stats) => self.stats = Some(stats),
            Err(e) => tracing::debug!("stats refresh failed: {e}"),
        }
    }

    /// Drop a lead from the cache. Returns true if it was the selected lead,
    /// in which case the selection and detail are cleared too.
    pub fn remove_lead(&mut self, phone: &str) -> bool {
        self.leads.retain(|l| l.phone != phone);
        if self.selected_phone.as_deref() == Some(phone) {
            self.selected_phone = None;
            self.selected_lead = None;
            true
        } else {
            false
        }
    }

    /// Refetch one lead and merge it into the cached list by phone, updating
    /// the detail view as well when that lead is selected. Leads unknown to
    /// the list are not inserted; the next full refresh picks them up.
    pub async fn update_lead_in_list(&mut self, api: &ApiClient, phone: &str) {
        match api.get_lead(phone).await {
            Ok(updated) => {
                if let Some(slot) = self.leads.iter_mut().find(|l| l.phone == phone) {
                    *slot = updated.clone();
                }
                if self.selected_phone.as_deref() == Some(phone) {
                    self.selected_lead = Some(updated);
                }
            }
            Err(e) => tracing::debug!("lead refresh failed for {phone}: {e}"),
        }
    }
}
