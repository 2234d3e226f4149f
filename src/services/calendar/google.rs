use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::CalendarBackend;
use crate::models::{BusyPeriod, EventRecord, TimeWindow};

const API_BASE: &str = "https://www.googleapis.com/calendar/v3";

pub struct GoogleCalendarBackend {
    access_token: String,
    calendar_id: String,
    time_zone: String,
    client: reqwest::Client,
}

impl GoogleCalendarBackend {
    pub fn new(access_token: String, calendar_id: String, time_zone: String) -> Self {
        Self {
            access_token,
            calendar_id,
            time_zone,
            client: reqwest::Client::new(),
        }
    }

    fn token(&self) -> anyhow::Result<&str> {
        anyhow::ensure!(
            !self.access_token.is_empty(),
            "calendar not authenticated (GOOGLE_CALENDAR_TOKEN is empty)"
        );
        Ok(&self.access_token)
    }

    async fn send(&self, req: reqwest::RequestBuilder, what: &str) -> anyhow::Result<Value> {
        let resp = req
            .bearer_auth(self.token()?)
            .send()
            .await
            .with_context(|| format!("failed to call Google Calendar {what}"))?;

        let status = resp.status();
        let data: Value = resp
            .json()
            .await
            .with_context(|| format!("failed to parse Google Calendar {what} response"))?;

        if !status.is_success() {
            anyhow::bail!("Google Calendar {what} error ({status}): {data}");
        }
        Ok(data)
    }
}

/// `dateTime` keeps its offset so the event lands at the same instant whatever
/// zone the calendar itself is set to; `timeZone` only affects display.
fn event_body(window: &TimeWindow, label: &str, notes: &str, time_zone: &str) -> Value {
    json!({
        "summary": format!("Callback: {label}"),
        "description": format!("Scheduled callback.\n\nCaller Info: {notes}"),
        "start": {
            "dateTime": window.start.to_rfc3339(),
            "timeZone": time_zone,
        },
        "end": {
            "dateTime": window.end.to_rfc3339(),
            "timeZone": time_zone,
        },
        "reminders": {
            "useDefault": false,
            "overrides": [{ "method": "popup", "minutes": 10 }],
        },
    })
}

/// Decodes each element on its own so one bad entry does not sink the feed.
fn decode_each<T: serde::de::DeserializeOwned>(items: &[Value], what: &str) -> Vec<T> {
    items
        .iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(error = %e, entry = %item, "skipping malformed {what}");
                None
            }
        })
        .collect()
}

#[async_trait]
impl CalendarBackend for GoogleCalendarBackend {
    async fn query_busy(&self, window: &TimeWindow) -> anyhow::Result<Vec<BusyPeriod>> {
        let body = json!({
            "timeMin": window.start.to_rfc3339(),
            "timeMax": window.end.to_rfc3339(),
            "timeZone": self.time_zone,
            "items": [{ "id": self.calendar_id }],
        });

        let data = self
            .send(
                self.client.post(format!("{API_BASE}/freeBusy")).json(&body),
                "freeBusy",
            )
            .await?;

        let busy = data["calendars"][&self.calendar_id]["busy"]
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("freeBusy response has no busy list: {data}"))?;

        let periods: Vec<BusyPeriod> = decode_each(busy, "busy period");
        tracing::debug!(count = periods.len(), "freeBusy returned busy periods");
        Ok(periods)
    }

    async fn list_events(&self, window: &TimeWindow) -> anyhow::Result<Vec<EventRecord>> {
        let url = format!("{API_BASE}/calendars/{}/events", self.calendar_id);
        let req = self.client.get(url).query(&[
            ("timeMin", window.start.to_rfc3339()),
            ("timeMax", window.end.to_rfc3339()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ]);

        let data = self.send(req, "events.list").await?;

        let events: Vec<EventRecord> = match data["items"].as_array() {
            Some(items) => decode_each(items, "event"),
            None => Vec::new(),
        };
        tracing::debug!(count = events.len(), "found existing events");
        Ok(events)
    }

    async fn create_event(
        &self,
        window: &TimeWindow,
        label: &str,
        notes: &str,
    ) -> anyhow::Result<Option<String>> {
        let body = event_body(window, label, notes, &self.time_zone);

        let url = format!("{API_BASE}/calendars/{}/events", self.calendar_id);
        let data = self
            .send(self.client.post(url).json(&body), "events.insert")
            .await?;

        Ok(data["htmlLink"].as_str().map(|s| s.to_string()))
    }
}
