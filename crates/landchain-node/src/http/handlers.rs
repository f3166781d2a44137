use crate::error::ApiError;
use crate::http::{page, uploads};
use crate::peers::{resolve_conflicts, ChainResponse};
use crate::state::AppState;
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{Form, Json};
use landchain_core::LandRecord;
use serde::Deserialize;
use serde_json::json;

/// Transfer fields as submitted by JSON clients and HTML forms
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TransferForm {
    #[serde(default)]
    id_tanah: Option<String>,
    #[serde(default)]
    pemilik_lama: Option<String>,
    #[serde(default)]
    pemilik_baru: Option<String>,
    #[serde(default)]
    lokasi: Option<String>,
    #[serde(default)]
    file_hash: Option<String>,
    #[serde(default)]
    file_url: Option<String>,
}

impl TransferForm {
    fn set(&mut self, field: &str, value: String) {
        let slot = match field {
            "id_tanah" => &mut self.id_tanah,
            "pemilik_lama" => &mut self.pemilik_lama,
            "pemilik_baru" => &mut self.pemilik_baru,
            "lokasi" => &mut self.lokasi,
            _ => return,
        };
        *slot = Some(value);
    }

    fn into_record(self) -> LandRecord {
        let mut record = LandRecord::new(
            self.id_tanah.unwrap_or_default(),
            self.pemilik_lama.unwrap_or_default(),
            self.pemilik_baru.unwrap_or_default(),
            self.lokasi.unwrap_or_default(),
        );
        record.file_hash = self.file_hash.filter(|h| !h.is_empty());
        record.file_url = self.file_url.filter(|u| !u.is_empty());
        record
    }
}

/// `GET /`: status as JSON, or the ledger page for browsers
pub(crate) async fn index_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let chain = state.chain.lock();
    if page::wants_html(&headers) {
        return Html(page::render_index(&state.node_id, &chain, None)).into_response();
    }
    Json(json!({
        "node_id": &*state.node_id,
        "length": chain.len(),
        "chain": chain.blocks(),
        "pending": chain.pending(),
        "nodes": chain.nodes(),
    }))
    .into_response()
}

/// Show a rejected browser submission on the ledger page
fn form_rejection(state: &AppState, headers: &HeaderMap, err: ApiError) -> Response {
    let status = err.status();
    if !status.is_client_error() || !page::wants_html(headers) {
        return err.into_response();
    }
    let message = err.to_string();
    let chain = state.chain.lock();
    (status, Html(page::render_index(&state.node_id, &chain, Some(&message)))).into_response()
}

pub(crate) async fn healthz_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn mine_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let block = state.mine().await?;
    let body = json!({
        "message": "New block mined (Proof of Work)",
        "index": block.index,
        "data": block.data,
        "proof": block.proof,
        "previous_hash": block.previous_hash,
        "hash": block.hash,
        "consensus": "Proof of Work",
    });
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// `POST /transactions/new`
///
/// JSON bodies get a JSON answer; form and multipart submissions are
/// redirected back to `/` like a browser form post. A rejected browser
/// submission is answered with the ledger page showing the error.
pub(crate) async fn new_transaction_handler(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    let headers = request.headers().clone();
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let submitted = match Multipart::from_request(request, &state).await {
            Ok(multipart) => submit_multipart(&state, multipart).await,
            Err(e) => Err(ApiError::BadRequest(e.body_text())),
        };
        Ok(match submitted {
            Ok(_) => Redirect::to("/").into_response(),
            Err(e) => form_rejection(&state, &headers, e),
        })
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let submitted = match Form::<TransferForm>::from_request(request, &state).await {
            Ok(Form(form)) => submit(&state, form.into_record()).await,
            Err(e) => Err(ApiError::BadRequest(e.body_text())),
        };
        Ok(match submitted {
            Ok(_) => Redirect::to("/").into_response(),
            Err(e) => form_rejection(&state, &headers, e),
        })
    } else {
        let Json(form) = Json::<TransferForm>::from_request(request, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let index = submit(&state, form.into_record()).await?;
        let body = json!({
            "message": format!("Transaction will be added to block {index}"),
            "index": index,
        });
        Ok((StatusCode::CREATED, Json(body)).into_response())
    }
}

async fn submit_multipart(state: &AppState, mut multipart: Multipart) -> Result<u64, ApiError> {
    let mut form = TransferForm::default();
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            // browsers send an empty part when no file was chosen
            if !file_name.is_empty() || !bytes.is_empty() {
                upload = Some((file_name, bytes.to_vec()));
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            form.set(&name, value);
        }
    }

    let mut record = form.into_record();
    record.validate().map_err(landchain_core::ChainError::from)?;
    if let Some((file_name, bytes)) = upload {
        let stored = uploads::store(&state.upload_dir, &file_name, &bytes).await?;
        record = record.with_file(stored.file_hash, stored.file_url);
    }
    submit(state, record).await
}

async fn submit(state: &AppState, record: LandRecord) -> Result<u64, ApiError> {
    state.write(move |chain| chain.new_transaction(record)).await
}

pub(crate) async fn uploaded_file_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let bytes = uploads::load(&state.upload_dir, &filename).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    )
        .into_response())
}

pub(crate) async fn full_chain_handler(State(state): State<AppState>) -> Json<ChainResponse> {
    let chain = state.chain.lock();
    Json(ChainResponse {
        chain: chain.blocks().to_vec(),
        length: chain.len(),
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterNodes {
    #[serde(default)]
    nodes: Option<Vec<String>>,
}

pub(crate) async fn register_nodes_handler(
    State(state): State<AppState>,
    body: Option<Json<RegisterNodes>>,
) -> Result<Response, ApiError> {
    let nodes = body
        .and_then(|Json(b)| b.nodes)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Please supply a valid list of nodes".into()))?;

    let total_nodes = state
        .write(move |chain| {
            chain.register_nodes(&nodes)?;
            Ok(chain.nodes().iter().cloned().collect::<Vec<_>>())
        })
        .await?;

    let body = json!({
        "message": "New nodes have been added",
        "total_nodes": total_nodes,
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

pub(crate) async fn consensus_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let replaced = resolve_conflicts(&state).await?;
    let chain = state.chain.lock();
    let body = if replaced {
        json!({ "message": "Our chain was replaced", "new_chain": chain.blocks() })
    } else {
        json!({ "message": "Our chain is authoritative", "chain": chain.blocks() })
    };
    Ok(Json(body))
}

pub(crate) async fn record_history_handler(
    State(state): State<AppState>,
    Path(id_tanah): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let transfers = state.chain.lock().history(&id_tanah)?;
    if transfers.is_empty() {
        return Err(ApiError::NotFound(format!("no transfers for parcel {id_tanah}")));
    }
    let current_owner = transfers.last().map(|t| t.record.pemilik_baru.clone());
    Ok(Json(json!({
        "id_tanah": id_tanah,
        "current_owner": current_owner,
        "count": transfers.len(),
        "transfers": transfers,
    })))
}
