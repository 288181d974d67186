use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use hybridrag_core::config::{EngineConfig, StorageConfig};
use hybridrag_core::{ChunkInput, Error, QueryParams};
use hybridrag_embed::{HashEmbedder, OverlapScorer};
use hybridrag_hybrid::{HybridEngine, IndexSnapshot, SCHEMA_VERSION};
use hybridrag_text::{StopwordLowercase, WhitespaceLowercase};

const TEXTS: [&str; 4] = [
    "Solar panels convert sunlight into electricity.",
    "Wind turbines generate power from moving air.",
    "Batteries store electricity for later use.",
    "Hydroelectric dams use flowing water to make power.",
];

fn engine() -> Result<HybridEngine> {
    let config = EngineConfig {
        storage: StorageConfig { snapshot_path: "indexes/energy.json".into() },
        ..EngineConfig::default()
    };
    Ok(HybridEngine::new(
        config,
        Arc::new(StopwordLowercase),
        Arc::new(HashEmbedder::new(128)?),
        Arc::new(OverlapScorer),
    )?)
}

fn inputs() -> Vec<ChunkInput> {
    TEXTS.iter().enumerate().map(|(i, t)| ChunkInput::new(*t, "energy.md", i as u32)).collect()
}

/// Splits a saved file into its header (as JSON) and body bytes.
fn split(path: &Path) -> Result<(serde_json::Value, Vec<u8>)> {
    let bytes = fs::read(path)?;
    let newline = bytes.iter().position(|&b| b == b'\n').ok_or_else(|| anyhow::anyhow!("no header"))?;
    Ok((serde_json::from_slice(&bytes[..newline])?, bytes[newline + 1..].to_vec()))
}

fn join(header: &serde_json::Value, body: &[u8]) -> Result<Vec<u8>> {
    let mut out = serde_json::to_vec(header)?;
    out.push(b'\n');
    out.extend_from_slice(body);
    Ok(out)
}

#[test]
fn restore_reproduces_query_results() -> Result<()> {
    let dir = TempDir::new()?;
    let writer = engine()?;
    let built = writer.rebuild_with_embedder(inputs())?;
    let path = writer.save_current(dir.path())?;
    assert_eq!(path, dir.path().join("indexes/energy.json"));

    let reader = engine()?;
    let restored = reader.restore(dir.path())?;
    assert_eq!(restored.generation(), built.generation());
    assert_eq!(reader.current()?.generation(), built.generation());

    let params = QueryParams::with_merge(3);
    for question in ["electricity storage", "power from water", "wind"] {
        let before = writer.query_detailed(&built, question, &params)?;
        let after = reader.query_detailed(&restored, question, &params)?;
        assert_eq!(before.fused, after.fused, "{question}");
        assert_eq!(before.hits, after.hits, "{question}");
    }
    Ok(())
}

#[test]
fn newer_incompatible_schema_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let engine = engine()?;
    engine.rebuild_with_embedder(inputs())?;
    let path = engine.save_current(dir.path())?;

    let (mut header, body) = split(&path)?;
    header["schema_version"] = serde_json::json!(SCHEMA_VERSION + 1);
    header["min_compatible_version"] = serde_json::json!(SCHEMA_VERSION + 1);
    fs::write(&path, join(&header, &body)?)?;

    let err = IndexSnapshot::load(&path, Arc::new(StopwordLowercase)).expect_err("future schema");
    assert!(
        matches!(err, Error::SnapshotVersion { found, supported } if found == SCHEMA_VERSION + 1 && supported == SCHEMA_VERSION),
        "got {err:?}"
    );
    Ok(())
}

#[test]
fn foreign_format_is_a_version_error() -> Result<()> {
    let dir = TempDir::new()?;
    let engine = engine()?;
    engine.rebuild_with_embedder(inputs())?;
    let path = engine.save_current(dir.path())?;

    let (mut header, body) = split(&path)?;
    header["format"] = serde_json::json!("hybridrag-snapshot-v0-pickle");
    fs::write(&path, join(&header, &body)?)?;

    let err = IndexSnapshot::load(&path, Arc::new(StopwordLowercase)).expect_err("foreign format");
    assert!(matches!(err, Error::SnapshotVersion { .. }), "got {err:?}");
    Ok(())
}

#[test]
fn reshaped_future_header_is_a_version_error() -> Result<()> {
    let dir = TempDir::new()?;
    let engine = engine()?;
    engine.rebuild_with_embedder(inputs())?;
    let path = engine.save_current(dir.path())?;

    let (mut header, body) = split(&path)?;
    header["schema_version"] = serde_json::json!(SCHEMA_VERSION + 1);
    header["min_compatible_version"] = serde_json::json!(SCHEMA_VERSION + 1);
    header["created_at"] = serde_json::json!(1_700_000_000);
    header["dim"] = serde_json::json!({ "rows": 128 });
    fs::write(&path, join(&header, &body)?)?;

    let fresh = self::engine()?;
    let err = fresh.restore(dir.path()).expect_err("future header");
    assert!(
        matches!(err, Error::SnapshotVersion { found, .. } if found == SCHEMA_VERSION + 1),
        "got {err:?}"
    );
    Ok(())
}

#[test]
fn restore_rejects_snapshot_of_other_dimension() -> Result<()> {
    let dir = TempDir::new()?;
    let writer = engine()?;
    writer.rebuild_with_embedder(inputs())?;
    writer.save_current(dir.path())?;

    let reader = HybridEngine::new(
        writer.config().clone(),
        Arc::new(StopwordLowercase),
        Arc::new(HashEmbedder::new(64)?),
        Arc::new(OverlapScorer),
    )?;
    let err = reader.restore(dir.path()).expect_err("64-dim embedder, 128-dim snapshot");
    assert!(matches!(err, Error::DimensionMismatch { expected: 64, actual: 128, .. }), "got {err:?}");
    assert!(matches!(reader.current(), Err(Error::NoActiveSnapshot)));
    Ok(())
}

#[test]
fn tampered_body_is_corrupt() -> Result<()> {
    let dir = TempDir::new()?;
    let writer = engine()?;
    writer.rebuild_with_embedder(inputs())?;
    let path = writer.save_current(dir.path())?;

    let (header, body) = split(&path)?;
    let tampered = String::from_utf8(body)?.replacen("Solar", "Lunar", 1);
    fs::write(&path, join(&header, tampered.as_bytes())?)?;

    let fresh = engine()?;
    assert!(matches!(fresh.restore(dir.path()), Err(Error::CorruptSnapshot(_))));
    assert!(matches!(fresh.current(), Err(Error::NoActiveSnapshot)), "nothing installed on a failed load");
    Ok(())
}

#[test]
fn tokenizer_must_match_the_build() -> Result<()> {
    let dir = TempDir::new()?;
    let engine = engine()?;
    engine.rebuild_with_embedder(inputs())?;
    let path = engine.save_current(dir.path())?;
    let err = IndexSnapshot::load(&path, Arc::new(WhitespaceLowercase)).expect_err("other tokenizer");
    assert!(matches!(err, Error::Configuration(_)), "got {err:?}");
    Ok(())
}

#[test]
fn missing_file_and_empty_engine() -> Result<()> {
    let dir = TempDir::new()?;
    let engine = engine()?;
    assert!(matches!(engine.save_current(dir.path()), Err(Error::NoActiveSnapshot)));
    assert!(matches!(engine.restore(dir.path()), Err(Error::Io(_))));
    Ok(())
}
