//! Command implementations
//!
//! Each command receives the loaded configuration and builds only the
//! components it needs.

use super::output::Output;
use crate::llm::{CompletionStream, Generator, Provider};
use crate::rag::corpus::{Corpus, save_chunks};
use crate::rag::document::load_document;
use crate::rag::embeddings::create_embedder;
use crate::rag::{Answer, AnswerPipeline, Retriever, Segmenter, StreamingAnswer};
use crate::types::{AppError, Result};
use crate::utils::toml_config::{ProviderConfig, ZoneqaConfig};
use crate::zoning::{Coordinates, PropertyCollection, WmsClient, collect_properties};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

const NO_ZONING: &str = "No zoning of the configured plan revision applies at this location.";

/// Split a document and write the chunk file.
pub async fn segment(
    config: &ZoneqaConfig,
    input: &Path,
    output_path: Option<PathBuf>,
    out: &Output,
) -> Result<()> {
    let units = read_units(config, input).await?;
    let path = output_path.unwrap_or_else(|| config.corpus.chunks_path.clone());

    save_chunks(&path, &units).await?;

    out.success(&format!("{} units", units.len()));
    out.created("chunks", &path.display().to_string());
    Ok(())
}

/// Segment, embed and index a document, writing both corpus artifacts.
pub async fn build(config: &ZoneqaConfig, input: Option<PathBuf>, out: &Output) -> Result<()> {
    let input = input
        .or_else(|| config.corpus.source_path.clone())
        .ok_or_else(|| {
            AppError::InvalidInput(
                "No input document given and corpus.source_path is not set".to_string(),
            )
        })?;

    out.step(1, 3, &format!("Segmenting {}", input.display()));
    let units = read_units(config, &input).await?;

    out.step(
        2,
        3,
        &format!(
            "Embedding {} units with {}",
            units.len(),
            config.embedding.model
        ),
    );
    let embedder = create_embedder(config)?;
    let corpus = Corpus::build(units, embedder.as_ref(), config.embedding.batch_size).await?;

    out.step(3, 3, "Writing corpus");
    corpus
        .save(&config.corpus.chunks_path, &config.corpus.index_path)
        .await?;

    out.created("chunks", &config.corpus.chunks_path.display().to_string());
    out.created("index", &config.corpus.index_path.display().to_string());
    out.success(&format!(
        "Indexed {} units ({} dimensions)",
        corpus.len(),
        corpus.dimensions()
    ));
    Ok(())
}

/// Show the zoning classification at a location.
pub async fn layers(
    config: &ZoneqaConfig,
    lat: f64,
    lon: f64,
    margin: Option<f64>,
    out: &Output,
) -> Result<()> {
    let coords = coordinates(config, lat, lon, margin)?;
    let collection = lookup_zoning(config, &coords).await;

    out.header(&format!("Zoning at {}, {}", coords.lat, coords.lon));
    for (layer, features) in &collection.properties {
        out.kv(layer, &format!("{} feature(s)", features.len()));
    }
    report_skipped(&collection, out);

    let lines = crate::rag::prompt::format_zoning_attributes(
        &collection.properties,
        &config.retrieval.plan_revision,
        &config.retrieval.excluded_fields,
    );

    out.subheader(&format!("Classification ({})", config.retrieval.plan_revision));
    if lines.is_empty() {
        out.warning(NO_ZONING);
    }
    for line in &lines {
        out.list_item(line);
    }
    Ok(())
}

/// Answer a question about a location.
pub async fn ask(
    config: &ZoneqaConfig,
    lat: f64,
    lon: f64,
    margin: Option<f64>,
    stream: bool,
    question: &str,
    out: &Output,
) -> Result<()> {
    let coords = coordinates(config, lat, lon, margin)?;
    let pipeline = open_pipeline(config).await?;

    let collection = lookup_zoning(config, &coords).await;
    report_skipped(&collection, out);

    if stream {
        let answer = pipeline
            .answer_streaming(&collection.properties, question)
            .await?;
        print_streaming(answer, out).await
    } else {
        let answer = pipeline.answer(&collection.properties, question).await?;
        print_answer(answer, out);
        Ok(())
    }
}

/// Answer a question without a location.
pub async fn chat(config: &ZoneqaConfig, stream: bool, question: &str, out: &Output) -> Result<()> {
    let pipeline = open_pipeline(config).await?;

    if stream {
        let answer = pipeline.chat_streaming(question).await?;
        print_streaming(answer, out).await
    } else {
        let answer = pipeline.chat(question).await?;
        print_answer(answer, out);
        Ok(())
    }
}

/// Print the configuration summary. Loading already validated it.
pub fn show_config(config: &ZoneqaConfig, path: &Path, validate_only: bool, out: &Output) {
    if validate_only {
        out.success(&format!("{} is valid", path.display()));
        return;
    }

    out.header("Configuration");
    out.kv("file", &path.display().to_string());

    out.subheader("Providers");
    let mut names: Vec<&String> = config.providers.keys().collect();
    names.sort();
    for name in names {
        let description = match &config.providers[name] {
            ProviderConfig::Mistral { api_base, .. } => format!("mistral ({})", api_base),
            ProviderConfig::Ollama { base_url } => format!("ollama ({})", base_url),
        };
        out.kv(name, &description);
    }

    out.subheader("Models");
    out.kv(
        "embedding",
        &format!(
            "{} via {} ({} dims, batch {})",
            config.embedding.model,
            config.embedding.provider,
            config.embedding.dimensions,
            config.embedding.batch_size
        ),
    );
    out.kv(
        "generation",
        &format!(
            "{} via {}",
            config.generation.model, config.generation.provider
        ),
    );

    out.subheader("Corpus");
    out.kv("chunks", &config.corpus.chunks_path.display().to_string());
    out.kv("index", &config.corpus.index_path.display().to_string());

    out.subheader("Retrieval");
    out.kv("top_k", &config.retrieval.top_k.to_string());
    out.kv("plan revision", &config.retrieval.plan_revision);

    out.subheader("Map service");
    out.kv("url", &config.map_service.wms_url);
    for layer in &config.map_service.layers {
        out.list_item(&format!("{} ({})", layer.name, layer.title));
    }
}

async fn read_units(config: &ZoneqaConfig, input: &Path) -> Result<Vec<String>> {
    let segmenter = Segmenter::from_config(&config.segmenter)?;
    let raw = load_document(input).await?;
    let units = segmenter.segment(&raw)?;
    info!(units = units.len(), input = %input.display(), "Segmented document");
    Ok(units)
}

fn coordinates(
    config: &ZoneqaConfig,
    lat: f64,
    lon: f64,
    margin: Option<f64>,
) -> Result<Coordinates> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(AppError::InvalidInput(format!(
            "Coordinates out of range: {}, {}",
            lat, lon
        )));
    }
    let margin = margin.unwrap_or(config.map_service.default_margin);
    if !(margin > 0.0) {
        return Err(AppError::InvalidInput("Margin must be > 0".to_string()));
    }
    Ok(Coordinates::new(lat, lon, margin))
}

async fn lookup_zoning(config: &ZoneqaConfig, coords: &Coordinates) -> PropertyCollection {
    let client = WmsClient::new(config.map_service.clone());
    collect_properties(
        &client,
        coords,
        config.map_service.max_concurrent_lookups,
        config.map_service.timeout(),
    )
    .await
}

async fn open_pipeline(config: &ZoneqaConfig) -> Result<AnswerPipeline> {
    let embedder = create_embedder(config)?;
    let corpus = Corpus::load(
        &config.corpus.chunks_path,
        &config.corpus.index_path,
        config.embedding.dimensions,
    )
    .await?;
    let retriever = Retriever::new(embedder, Arc::new(corpus))?;

    let provider = Provider::from_config(config)?;
    info!(provider = provider.name(), model = provider.model(), "Using generation provider");
    let generator = Generator::new(
        Arc::from(provider.create_client()?),
        config.generation.persona.clone(),
        config.generation.timeout(),
    );

    Ok(AnswerPipeline::new(
        retriever,
        generator,
        config.retrieval.clone(),
    ))
}

fn report_skipped(collection: &PropertyCollection, out: &Output) {
    for (layer, reason) in &collection.skipped {
        out.skipped(layer, &reason.to_string());
    }
}

fn print_answer(answer: Answer, out: &Output) {
    match answer {
        Answer::Grounded {
            text, citations, ..
        } => {
            out.answer(&text);
            out.citations(&citations);
        }
        Answer::NoApplicableZoning => out.warning(NO_ZONING),
    }
}

async fn print_streaming(answer: StreamingAnswer, out: &Output) -> Result<()> {
    match answer {
        StreamingAnswer::Grounded {
            stream, citations, ..
        } => {
            out.newline();
            drain(stream, out).await?;
            out.newline();
            out.citations(&citations);
            Ok(())
        }
        StreamingAnswer::NoApplicableZoning => {
            out.warning(NO_ZONING);
            Ok(())
        }
    }
}

/// Print fragments until the stream ends, fails, or the user interrupts.
async fn drain(mut stream: CompletionStream, out: &Output) -> Result<()> {
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            next = stream.next() => match next {
                Some(Ok(fragment)) => out.fragment(&fragment),
                Some(Err(e)) => {
                    out.newline();
                    return Err(e);
                }
                None => return Ok(()),
            },
            _ = &mut interrupt => {
                warn!("Answer interrupted");
                stream.close();
                out.newline();
                out.warning("Interrupted");
                return Ok(());
            }
        }
    }
}
