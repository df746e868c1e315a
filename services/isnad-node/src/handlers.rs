use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use isnad_domain::{unix_now, AgentProfile, Attestation, Delegation, Revocation};
use isnad_events::event_type;
use isnad_identity::Identity;
use isnad_ledger::{bundle, TrustCheck};
use isnad_monitor::MetricsExporter;
use isnad_policy::{EvaluationContext, TrustPolicy};

use crate::state::AppState;

fn storage_error(e: impl std::fmt::Display) -> StatusCode {
    error!(error = %e, "Storage failure");
    StatusCode::INTERNAL_SERVER_ERROR
}

// ── identities ────────────────────────────────────────────────────────────────

pub async fn create_identity(
    State(_state): State<Arc<AppState>>,
) -> Result<Json<Value>, StatusCode> {
    let identity = Identity::generate();
    let export = identity.export();
    info!(agent_id = %export.agent_id, "Identity created");
    Ok(Json(json!({
        "agent_id": export.agent_id,
        "public_key": export.public_key,
        "private_key": export.private_key,
        "created_at": export.created_at,
    })))
}

pub async fn get_identity(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let ledger = state.ledger.read().await;
    let received = ledger.by_subject(&agent_id).len();
    let given = ledger.by_witness(&agent_id).len();
    if received == 0 && given == 0 && !ledger.is_revoked(&agent_id, None) {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(json!({
        "agent_id": agent_id,
        "trust_score": ledger.trust_score(&agent_id, None),
        "attestations_received": received,
        "attestations_given": given,
        "revoked": ledger.is_revoked(&agent_id, None),
    })))
}

// ── attestations ──────────────────────────────────────────────────────────────

pub async fn create_attestation(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Attestation>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let id = payload.attestation_id();
    let subject = payload.subject.clone();
    let witness = payload.witness.clone();
    let task = payload.task.clone();

    let added = {
        let mut ledger = state.ledger.write().await;
        ledger.add(payload).map_err(storage_error)?
    };

    if added {
        state.bus.emit(
            event_type::ATTESTATION_CREATED,
            json!({"subject": subject, "witness": witness, "task": task}),
            Some(witness.clone()),
        );
        let score = state.ledger.read().await.trust_score(&subject, None);
        state.monitor.record_attestation(&witness, &subject, score, None);
    }

    let status = if added { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(json!({"added": added, "attestation_id": id}))))
}

pub async fn create_attestations_batch(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Vec<Attestation>>,
) -> Result<Json<Value>, StatusCode> {
    let mut results = Vec::with_capacity(payload.len());
    let mut added_count = 0usize;

    for attestation in payload {
        let id = attestation.attestation_id();
        let subject = attestation.subject.clone();
        let witness = attestation.witness.clone();
        let task = attestation.task.clone();

        let added = {
            let mut ledger = state.ledger.write().await;
            ledger.add(attestation).map_err(storage_error)?
        };
        if added {
            added_count += 1;
            state.bus.emit(
                event_type::ATTESTATION_CREATED,
                json!({"subject": subject, "witness": witness, "task": task}),
                Some(witness.clone()),
            );
            let score = state.ledger.read().await.trust_score(&subject, None);
            state.monitor.record_attestation(&witness, &subject, score, None);
        }
        results.push(json!({"attestation_id": id, "added": added}));
    }

    Ok(Json(json!({"added": added_count, "results": results})))
}

pub async fn verify_attestation(
    Json(payload): Json<Attestation>,
) -> Result<Json<Value>, StatusCode> {
    let signature_valid = payload.verify();
    let witness_valid = payload.witness_matches_key();
    Ok(Json(json!({
        "valid": signature_valid && witness_valid,
        "signature_valid": signature_valid,
        "witness_matches_key": witness_valid,
        "attestation_id": payload.attestation_id(),
    })))
}

pub async fn attestations_by_subject(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let ledger = state.ledger.read().await;
    let attestations: Vec<Value> = ledger
        .by_subject(&agent_id)
        .iter()
        .map(|a| a.to_wire())
        .collect();
    Ok(Json(json!({"agent_id": agent_id, "attestations": attestations})))
}

pub async fn attestations_by_witness(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let ledger = state.ledger.read().await;
    let attestations: Vec<Value> = ledger
        .by_witness(&agent_id)
        .iter()
        .map(|a| a.to_wire())
        .collect();
    Ok(Json(json!({"agent_id": agent_id, "attestations": attestations})))
}

// ── trust ─────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ScoreQuery {
    pub scope: Option<String>,
}

pub async fn trust_score(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Query(query): Query<ScoreQuery>,
) -> Result<Json<Value>, StatusCode> {
    let (score, basis) = {
        let ledger = state.ledger.read().await;
        (
            ledger.trust_score(&agent_id, query.scope.as_deref()),
            ledger.by_subject(&agent_id).len(),
        )
    };

    let check = TrustCheck::new(&agent_id, score, query.scope.clone());
    if let Err(e) = check.record(&state.backend) {
        error!(error = %e, "Failed to record trust check");
    }

    Ok(Json(json!({
        "agent_id": agent_id,
        "score": score,
        "scope": query.scope,
        "attestations": basis,
    })))
}

pub async fn trust_history(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let history = TrustCheck::history(&state.backend, &agent_id, 50).map_err(storage_error)?;
    Ok(Json(json!({"agent_id": agent_id, "history": history})))
}

#[derive(Deserialize)]
pub struct TransitiveQuery {
    pub max_hops: Option<u32>,
}

pub async fn transitive_trust(
    State(state): State<Arc<AppState>>,
    Path((source, target)): Path<(String, String)>,
    Query(query): Query<TransitiveQuery>,
) -> Result<Json<Value>, StatusCode> {
    let max_hops = query.max_hops.unwrap_or(5);
    let ledger = state.ledger.read().await;
    Ok(Json(json!({
        "source": source,
        "target": target,
        "max_hops": max_hops,
        "trust": ledger.chain_trust(&source, &target, max_hops),
    })))
}

// ── chain / bundles ───────────────────────────────────────────────────────────

pub async fn export_chain(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, StatusCode> {
    let ledger = state.ledger.read().await;
    let bundle = bundle::export_bundle(&ledger, None, Some(json!({"origin": "isnad-node"})))
        .map_err(storage_error)?;
    serde_json::to_value(&bundle)
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn import_chain(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<bundle::Bundle>,
) -> Result<Json<Value>, StatusCode> {
    let imported = match bundle::from_bundle(&payload, true) {
        Ok(imported) => imported,
        Err(e) => {
            info!(error = %e, "Bundle import rejected");
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    let mut added = 0usize;
    {
        let mut ledger = state.ledger.write().await;
        for attestation in imported.attestations() {
            if ledger.add(attestation.clone()).map_err(storage_error)? {
                added += 1;
            }
        }
    }

    Ok(Json(json!({
        "imported": added,
        "received": payload.attestations.len(),
    })))
}

pub async fn verify_chain_bundle(
    Json(payload): Json<bundle::Bundle>,
) -> Result<Json<Value>, StatusCode> {
    match bundle::from_bundle(&payload, true) {
        Ok(imported) => Ok(Json(json!({
            "valid": true,
            "attestations": imported.len(),
        }))),
        Err(e) => Ok(Json(json!({"valid": false, "reason": e.to_string()}))),
    }
}

// ── revocations ───────────────────────────────────────────────────────────────

pub async fn create_revocation(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Revocation>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let target = payload.target_id.clone();
    let revoker = payload.revoked_by.clone();
    let reason = payload.reason.clone();

    {
        let mut ledger = state.ledger.write().await;
        ledger.revoke(payload).map_err(storage_error)?;
    }

    state.bus.emit(
        event_type::ATTESTATION_REVOKED,
        json!({"target_id": target, "reason": reason}),
        Some(revoker.clone()),
    );
    state.monitor.record_revocation(&revoker, &target, None);

    Ok((StatusCode::CREATED, Json(json!({"revoked": target}))))
}

pub async fn revocations_for_target(
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let ledger = state.ledger.read().await;
    let entries = ledger.revocations().entries_for(&target_id).to_vec();
    Ok(Json(json!({"target_id": target_id, "revocations": entries})))
}

// ── delegations ───────────────────────────────────────────────────────────────

pub async fn create_delegation(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Delegation>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let id = payload.delegation_id();
    let principal = payload.principal.clone();
    let delegate = payload.delegate.clone();

    let added = {
        let ledger = state.ledger.read().await;
        let mut delegations = state.delegations.write().await;
        delegations
            .add(payload, ledger.revocations())
            .map_err(storage_error)?
    };

    if added {
        state.bus.emit(
            event_type::DELEGATION_CREATED,
            json!({"principal": principal, "delegate": delegate}),
            Some(principal.clone()),
        );
        state.monitor.record_delegation(&principal, &delegate, None);
    }

    let status = if added { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(json!({"added": added, "delegation_id": id}))))
}

pub async fn verify_delegation_chain(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let ledger = state.ledger.read().await;
    let delegations = state.delegations.read().await;
    let verdict = delegations.verify_chain(&id, unix_now(), ledger.revocations());
    Ok(Json(json!({
        "delegation_id": id,
        "valid": verdict.valid,
        "reason": verdict.reason,
    })))
}

pub async fn delegations_for_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let ledger = state.ledger.read().await;
    let delegations = state.delegations.read().await;
    let active: Vec<&Delegation> = delegations.delegations_for(&agent_id, ledger.revocations());
    let active: Vec<Value> = active
        .into_iter()
        .map(|d| serde_json::to_value(d).unwrap_or(Value::Null))
        .collect();
    Ok(Json(json!({"agent_id": agent_id, "delegations": active})))
}

// ── policies ──────────────────────────────────────────────────────────────────

pub async fn create_policy(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TrustPolicy>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let name = payload.name.clone();
    state.policies.write().await.insert(name.clone(), payload);
    Ok((StatusCode::CREATED, Json(json!({"name": name}))))
}

pub async fn list_policies(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, StatusCode> {
    let policies = state.policies.read().await;
    let names: Vec<&String> = policies.keys().collect();
    Ok(Json(json!({"policies": names})))
}

pub async fn get_policy(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let policies = state.policies.read().await;
    let policy = policies.get(&name).ok_or(StatusCode::NOT_FOUND)?;
    serde_json::to_value(policy)
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn delete_policy(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let removed = state.policies.write().await.remove(&name).is_some();
    if removed {
        Ok(Json(json!({"deleted": name})))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

pub async fn evaluate_policy(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(context): Json<EvaluationContext>,
) -> Result<Json<Value>, StatusCode> {
    let policies = state.policies.read().await;
    let policy = policies.get(&name).ok_or(StatusCode::NOT_FOUND)?;
    let decision = policy.evaluate(&context);
    serde_json::to_value(&decision)
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn evaluate_policy_batch(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(contexts): Json<Vec<EvaluationContext>>,
) -> Result<Json<Value>, StatusCode> {
    let policies = state.policies.read().await;
    let policy = policies.get(&name).ok_or(StatusCode::NOT_FOUND)?;
    let decisions = policy.evaluate_batch(&contexts);
    serde_json::to_value(&decisions)
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// ── discovery ─────────────────────────────────────────────────────────────────

pub async fn register_profile(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AgentProfile>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let agent_id = payload.agent_id.clone();
    let registered = state.discovery.write().await.register(payload);
    if registered {
        state.bus.emit(
            event_type::AGENT_REGISTERED,
            json!({"agent_id": agent_id}),
            Some(agent_id.clone()),
        );
        Ok((StatusCode::CREATED, Json(json!({"agent_id": agent_id}))))
    } else {
        Err(StatusCode::BAD_REQUEST)
    }
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub capability: Option<String>,
    pub name: Option<String>,
    pub limit: Option<usize>,
}

pub async fn search_profiles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>, StatusCode> {
    let discovery = state.discovery.read().await;
    let results: Vec<Value> = discovery
        .search(
            query.capability.as_deref(),
            query.name.as_deref(),
            query.limit.unwrap_or(50),
        )
        .into_iter()
        .map(|p| serde_json::to_value(p).unwrap_or(Value::Null))
        .collect();
    Ok(Json(json!({"results": results})))
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let discovery = state.discovery.read().await;
    let profile = discovery.get(&agent_id).ok_or(StatusCode::NOT_FOUND)?;
    serde_json::to_value(profile)
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn remove_profile(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    if state.discovery.write().await.unregister(&agent_id) {
        Ok(Json(json!({"removed": agent_id})))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

// ── platform data ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct PlatformDeclaration {
    pub name: String,
    pub url: String,
}

pub async fn declare_platform(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Json(payload): Json<PlatformDeclaration>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    if payload.url.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    state
        .directory
        .add_platform(&agent_id, &payload.name, &payload.url);
    Ok((
        StatusCode::CREATED,
        Json(json!({"agent_id": agent_id, "platform": payload.name, "url": payload.url})),
    ))
}

pub async fn platform_data(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let data = state.worker.platform_data(&agent_id).map_err(storage_error)?;
    Ok(Json(json!({"agent_id": agent_id, "platforms": data})))
}

pub async fn scan_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    match state.worker.scan_agent(&agent_id).await {
        Ok(results) => {
            for result in &results {
                state
                    .monitor
                    .record_scan(&agent_id, &result.platform, result.alive, None);
            }
            Ok(Json(json!({"agent_id": agent_id, "results": results})))
        }
        Err(isnad_scanner::ScannerError::AgentNotFound(_)) => Err(StatusCode::NOT_FOUND),
        Err(e) => Err(storage_error(e)),
    }
}

pub async fn erase_agent(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let removed = {
        let mut ledger = state.ledger.write().await;
        ledger.erase_agent(&agent_id).map_err(storage_error)?
    };
    state.directory.remove_agent(&agent_id);
    state.discovery.write().await.unregister(&agent_id);
    Ok(Json(json!({"agent_id": agent_id, "records_removed": removed})))
}

// ── monitoring / events ───────────────────────────────────────────────────────

pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    MetricsExporter::new(&state.monitor).prometheus()
}

#[derive(Deserialize)]
pub struct EventsQuery {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub limit: Option<usize>,
}

pub async fn recent_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Value>, StatusCode> {
    let events = state.bus.history(
        query.event_type.as_deref(),
        None,
        Some(query.limit.unwrap_or(50)),
    );
    Ok(Json(json!({"events": events})))
}
