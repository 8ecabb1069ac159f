use super::wire::{GuestFields, LooseBool, LooseNumber, LooseText};
use super::{ensure_success, http_client};
use crate::application::ports::RemoteGateway;
use crate::domain::entities::{Guest, GuestDraft};
use crate::shared::config::BackendConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const STATUS_SUCCESS: &str = "success";

/// Gateway for a single spreadsheet script endpoint that multiplexes
/// operations through an `action` parameter.
pub struct ScriptApiGateway {
    client: Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct ScriptResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    guests: Option<Vec<ScriptGuestDto>>,
    #[serde(default)]
    guest: Option<ScriptGuestDto>,
}

impl ScriptResponse {
    fn into_success(self) -> Result<Self, AppError> {
        if self.status == STATUS_SUCCESS {
            return Ok(self);
        }
        let message = self
            .message
            .unwrap_or_else(|| format!("script endpoint reported status '{}'", self.status));
        Err(AppError::Protocol(message))
    }
}

#[derive(Debug, Deserialize)]
struct ScriptGuestDto {
    #[serde(default)]
    id: Option<LooseText>,
    #[serde(default)]
    name: Option<LooseText>,
    #[serde(default)]
    table: Option<LooseNumber>,
    #[serde(default)]
    present: Option<LooseBool>,
    #[serde(default)]
    phone: Option<LooseText>,
    #[serde(default)]
    email: Option<String>,
}

impl ScriptGuestDto {
    fn into_guest(self) -> Option<Guest> {
        let id = self.id.map(LooseText::into_string)?;
        GuestFields {
            name: self.name.map(LooseText::into_string),
            table: self.table,
            present: self.present,
            phone: self.phone.map(LooseText::into_string),
            email: self.email,
        }
        .into_guest(&id)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum ScriptAction {
    UpdateGuest,
    AddGuest,
}

#[derive(Debug, Serialize)]
struct ScriptRequest<'a> {
    action: ScriptAction,
    guest: ScriptGuestOut<'a>,
}

#[derive(Debug, Serialize)]
struct ScriptGuestOut<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    name: &'a str,
    table: u32,
    present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
}

impl<'a> ScriptGuestOut<'a> {
    fn from_guest(guest: &'a Guest) -> Self {
        Self {
            id: Some(guest.id.as_str()),
            name: &guest.name,
            table: guest.table.value(),
            present: guest.present,
            phone: guest.phone.as_deref(),
            email: guest.email.as_deref(),
        }
    }

    fn from_draft(draft: &'a GuestDraft) -> Self {
        Self {
            id: None,
            name: &draft.name,
            table: draft.table.value(),
            present: draft.present,
            phone: draft.phone.as_deref(),
            email: draft.email.as_deref(),
        }
    }
}

impl ScriptApiGateway {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, AppError> {
        let url = config
            .script_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                AppError::ConfigurationError("script API requires an endpoint URL".to_string())
            })?;
        Ok(Self::new(http_client(config.request_timeout_secs)?, url))
    }

    async fn post(&self, request: &ScriptRequest<'_>) -> Result<ScriptResponse, AppError> {
        let response = self.client.post(&self.url).json(request).send().await?;
        let response = ensure_success(response).await?;
        response.json::<ScriptResponse>().await?.into_success()
    }
}

#[async_trait]
impl RemoteGateway for ScriptApiGateway {
    async fn list_guests(&self) -> Result<Vec<Guest>, AppError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("action", "getAllGuests")])
            .send()
            .await?;
        let payload = ensure_success(response)
            .await?
            .json::<ScriptResponse>()
            .await?
            .into_success()?;

        let rows = payload.guests.ok_or_else(|| {
            AppError::Protocol("getAllGuests response is missing 'guests'".to_string())
        })?;

        let total = rows.len();
        let guests: Vec<Guest> = rows
            .into_iter()
            .filter_map(ScriptGuestDto::into_guest)
            .collect();
        if guests.len() < total {
            tracing::warn!(
                target: "guestlist::remote",
                skipped = total - guests.len(),
                "skipping script rows without an id or a guest name"
            );
        }
        Ok(guests)
    }

    async fn update_guest(&self, guest: &Guest) -> Result<(), AppError> {
        let request = ScriptRequest {
            action: ScriptAction::UpdateGuest,
            guest: ScriptGuestOut::from_guest(guest),
        };
        self.post(&request).await?;
        Ok(())
    }

    async fn create_guest(&self, draft: &GuestDraft) -> Result<Guest, AppError> {
        let request = ScriptRequest {
            action: ScriptAction::AddGuest,
            guest: ScriptGuestOut::from_draft(draft),
        };
        let response = self.post(&request).await?;

        let created = response
            .guest
            .and_then(ScriptGuestDto::into_guest)
            .ok_or_else(|| {
                AppError::Protocol("addGuest response is missing the created guest".to_string())
            })?;
        Ok(created)
    }
}
