use super::wire::{GuestFields, LooseBool, LooseNumber, LooseText};
use super::{ensure_success, http_client};
use crate::application::ports::RemoteGateway;
use crate::domain::entities::{Guest, GuestDraft};
use crate::domain::value_objects::GuestId;
use crate::shared::config::BackendConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Gateway for a hosted table store addressed as `{api_root}/{base}/{table}`
/// with bearer-token authentication.
///
/// Column names follow the event spreadsheet: `nom`, `table`, `present`.
pub struct TableApiGateway {
    client: Client,
    api_root: String,
    base_id: String,
    table_name: String,
    api_token: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<RecordDto>,
    #[serde(default)]
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordDto {
    id: String,
    #[serde(default)]
    fields: FieldsDto,
}

#[derive(Debug, Default, Deserialize)]
struct FieldsDto {
    #[serde(default)]
    nom: Option<LooseText>,
    #[serde(default)]
    table: Option<LooseNumber>,
    #[serde(default)]
    present: Option<LooseBool>,
    #[serde(default)]
    phone: Option<LooseText>,
    #[serde(default)]
    email: Option<String>,
}

impl From<FieldsDto> for GuestFields {
    fn from(fields: FieldsDto) -> Self {
        GuestFields {
            name: fields.nom.map(LooseText::into_string),
            table: fields.table,
            present: fields.present,
            phone: fields.phone.map(LooseText::into_string),
            email: fields.email,
        }
    }
}

#[derive(Debug, Serialize)]
struct WriteRequest<'a> {
    fields: WriteFields<'a>,
    typecast: bool,
}

#[derive(Debug, Serialize)]
struct WriteFields<'a> {
    nom: &'a str,
    table: u32,
    present: bool,
}

impl<'a> WriteRequest<'a> {
    fn new(name: &'a str, table: u32, present: bool) -> Self {
        Self {
            fields: WriteFields {
                nom: name,
                table,
                present,
            },
            typecast: true,
        }
    }
}

impl TableApiGateway {
    pub fn new(
        client: Client,
        api_root: impl Into<String>,
        base_id: impl Into<String>,
        table_name: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_root: api_root.into(),
            base_id: base_id.into(),
            table_name: table_name.into(),
            api_token: api_token.into(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, AppError> {
        let token = config.api_token.clone().ok_or_else(|| {
            AppError::ConfigurationError("table API requires an API token".to_string())
        })?;
        if config.base_id.trim().is_empty() {
            return Err(AppError::ConfigurationError(
                "table API requires a base ID".to_string(),
            ));
        }

        Ok(Self::new(
            http_client(config.request_timeout_secs)?,
            config.api_root.clone(),
            config.base_id.clone(),
            config.table_name.clone(),
            token,
        ))
    }

    fn table_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.api_root.trim_end_matches('/'),
            self.base_id,
            self.table_name
        )
    }

    fn record_url(&self, id: &GuestId) -> String {
        format!("{}/{}", self.table_url(), id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.bearer_auth(&self.api_token)
    }

    async fn fetch_page(&self, offset: Option<&str>) -> Result<ListResponse, AppError> {
        let mut request = self.authorize(self.client.get(self.table_url()));
        if let Some(offset) = offset {
            request = request.query(&[("offset", offset)]);
        }

        let response = ensure_success(request.send().await?).await?;
        Ok(response.json::<ListResponse>().await?)
    }
}

#[async_trait]
impl RemoteGateway for TableApiGateway {
    async fn list_guests(&self) -> Result<Vec<Guest>, AppError> {
        let mut guests = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let page = self.fetch_page(offset.as_deref()).await?;
            for record in page.records {
                let fields = GuestFields::from(record.fields);
                match fields.into_guest(&record.id) {
                    Some(guest) => guests.push(guest),
                    None => tracing::warn!(
                        target: "guestlist::remote",
                        record_id = %record.id,
                        "skipping table record without a guest name"
                    ),
                }
            }

            match page.offset {
                Some(next) if !next.is_empty() => offset = Some(next),
                _ => break,
            }
        }

        tracing::debug!(
            target: "guestlist::remote",
            count = guests.len(),
            "guests loaded from table API"
        );
        Ok(guests)
    }

    async fn update_guest(&self, guest: &Guest) -> Result<(), AppError> {
        let body = WriteRequest::new(&guest.name, guest.table.value(), guest.present);
        let request = self.authorize(self.client.patch(self.record_url(&guest.id)));
        let response = ensure_success(request.json(&body).send().await?).await?;

        // The body is the updated record; only its shape is checked.
        response.json::<RecordDto>().await?;
        Ok(())
    }

    async fn create_guest(&self, draft: &GuestDraft) -> Result<Guest, AppError> {
        let body = WriteRequest::new(&draft.name, draft.table.value(), draft.present);
        let request = self.authorize(self.client.post(self.table_url()));
        let response = ensure_success(request.json(&body).send().await?).await?;

        let record = response.json::<RecordDto>().await?;
        let id = GuestId::new(record.id).map_err(AppError::Protocol)?;
        Ok(Guest::from_draft(id, draft.clone()))
    }
}
