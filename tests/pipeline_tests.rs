//! End-to-end tests for the answer pipeline
//!
//! Corpus building, retrieval, prompt composition and generation wired
//! together over in-process doubles.

mod common;

use common::mocks::{FailingEmbedder, MockLLMClient, VocabularyEmbedder, feature};
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use zoneqa::llm::Generator;
use zoneqa::rag::prompt::SYSTEM_PERSONA;
use zoneqa::rag::{Answer, AnswerPipeline, Corpus, Embedder, Retriever, StreamingAnswer};
use zoneqa::types::{AppError, MessageRole};
use zoneqa::utils::toml_config::RetrievalConfig;
use zoneqa::zoning::LayerProperties;

// ============= Helpers =============

const ARTICLES: [&str; 3] = [
    "Artigo 10.º\nÁrea de Frente Urbana Contínua\nA edificação respeita o alinhamento.",
    "Artigo 20.º\nEspaço verde de fruição coletiva\nNão é permitida edificação.",
    "Artigo 30.º\nÁrea de atividades económicas\nUsos industriais e armazéns.",
];

async fn build_corpus(embedder: &dyn Embedder, texts: &[&str]) -> Corpus {
    let texts = texts.iter().map(|t| t.to_string()).collect();
    Corpus::build(texts, embedder, 2).await.unwrap()
}

async fn retriever(texts: &[&str]) -> (Retriever, Arc<VocabularyEmbedder>) {
    let embedder = Arc::new(VocabularyEmbedder::new(64));
    let corpus = build_corpus(embedder.as_ref(), texts).await;
    let retriever = Retriever::new(embedder.clone(), Arc::new(corpus)).unwrap();
    (retriever, embedder)
}

fn retrieval(top_k: usize) -> RetrievalConfig {
    RetrievalConfig {
        top_k,
        ..Default::default()
    }
}

async fn pipeline(client: &MockLLMClient) -> (AnswerPipeline, Arc<VocabularyEmbedder>) {
    let (retriever, embedder) = retriever(&ARTICLES).await;
    let generator = Generator::new(Arc::new(client.clone()), None, Duration::from_secs(5));
    (
        AnswerPipeline::new(retriever, generator, retrieval(1)),
        embedder,
    )
}

fn frente_urbana(revision: &str) -> LayerProperties {
    let mut properties = LayerProperties::new();
    properties.insert(
        "pdm:qualificacao_solo".to_string(),
        vec![feature(json!({
            "abstract": revision,
            "nome": "Qualificação do Solo",
            "id": 7,
            "categoria": "Área de Frente Urbana Contínua",
        }))],
    );
    properties
}

// ============= Retrieval Scenarios =============

#[tokio::test]
async fn test_query_retrieves_matching_article() {
    let (retriever, _) = retriever(&["Artigo 1.\nTexto A", "Artigo 2.\nTexto B"]).await;

    let results = retriever.retrieve("Texto A", 1).await.unwrap();
    let texts: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();

    assert_eq!(texts, vec!["Artigo 1.\nTexto A"]);
}

#[tokio::test]
async fn test_query_after_reload_from_disk() {
    let dir = TempDir::new().unwrap();
    let chunks_path = dir.path().join("chunks.txt");
    let index_path = dir.path().join("embeddings.index");

    let embedder = Arc::new(VocabularyEmbedder::new(32));
    let corpus = build_corpus(
        embedder.as_ref(),
        &["Artigo 1.\nTexto A", "Artigo 2.\nTexto B"],
    )
    .await;
    corpus.save(&chunks_path, &index_path).await.unwrap();

    let loaded = Corpus::load(&chunks_path, &index_path, 32).await.unwrap();
    assert_eq!(loaded.chunks(), corpus.chunks());

    let retriever = Retriever::new(embedder, Arc::new(loaded)).unwrap();
    let results = retriever.retrieve("Texto A", 1).await.unwrap();
    assert_eq!(results[0].chunk.text, "Artigo 1.\nTexto A");
    assert_eq!(results[0].chunk.label(), "Artigo 1.");
}

#[tokio::test]
async fn test_reload_rejects_wrong_dimensions() {
    let dir = TempDir::new().unwrap();
    let chunks_path = dir.path().join("chunks.txt");
    let index_path = dir.path().join("embeddings.index");

    let embedder = VocabularyEmbedder::new(8);
    build_corpus(&embedder, &["Artigo 1.\nTexto A"])
        .await
        .save(&chunks_path, &index_path)
        .await
        .unwrap();

    let err = Corpus::load(&chunks_path, &index_path, 1024).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::DimensionMismatch {
            expected: 1024,
            actual: 8
        }
    ));
}

#[tokio::test]
async fn test_retriever_rejects_embedder_of_other_dimension() {
    let corpus = build_corpus(&VocabularyEmbedder::new(8), &ARTICLES).await;
    let result = Retriever::new(Arc::new(VocabularyEmbedder::new(16)), Arc::new(corpus));
    assert!(matches!(result, Err(AppError::DimensionMismatch { .. })));
}

// ============= Located Answers =============

#[tokio::test]
async fn test_answer_is_grounded_on_classified_article() {
    let client = MockLLMClient::new("Sim, desde que respeite o **Artigo 10.º**.");
    let (pipeline, _) = pipeline(&client).await;

    let answer = pipeline
        .answer(&frente_urbana("PDM 2021"), "Posso construir uma moradia?")
        .await
        .unwrap();

    assert_eq!(
        answer,
        Answer::Grounded {
            text: "Sim, desde que respeite o **Artigo 10.º**.".to_string(),
            citations: vec!["Artigo 10.º".to_string()],
            classification: vec!["Área de Frente Urbana Contínua".to_string()],
        }
    );
}

#[tokio::test]
async fn test_prompt_carries_persona_classification_articles_and_question() {
    let client = MockLLMClient::new("ok");
    let (pipeline, _) = pipeline(&client).await;

    pipeline
        .answer(&frente_urbana("PDM 2021"), "Posso construir aqui?")
        .await
        .unwrap();

    let received = client.received();
    assert_eq!(received.len(), 1);

    let messages = &received[0];
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::System);
    assert_eq!(messages[0].content, SYSTEM_PERSONA);
    assert_eq!(messages[1].role, MessageRole::User);

    let prompt = &messages[1].content;
    let classification = prompt.find("Área de Frente Urbana Contínua").unwrap();
    let article = prompt.find("A edificação respeita o alinhamento.").unwrap();
    let question = prompt.find("Posso construir aqui?").unwrap();
    assert!(classification < article && article < question);
    assert!(!prompt.contains("Espaço verde"));
}

#[tokio::test]
async fn test_other_plan_revision_short_circuits() {
    let client = MockLLMClient::new("should not be used");
    let (pipeline, embedder) = pipeline(&client).await;
    let calls_after_build = embedder.calls();

    let answer = pipeline
        .answer(&frente_urbana("PDM 2006"), "Posso construir?")
        .await
        .unwrap();

    assert_eq!(answer, Answer::NoApplicableZoning);
    assert_eq!(embedder.calls(), calls_after_build);
    assert!(client.received().is_empty());
}

#[tokio::test]
async fn test_no_layers_short_circuits() {
    let client = MockLLMClient::new("should not be used");
    let (pipeline, _) = pipeline(&client).await;

    let answer = pipeline
        .answer(&LayerProperties::new(), "Posso construir?")
        .await
        .unwrap();

    assert_eq!(answer, Answer::NoApplicableZoning);
}

#[tokio::test]
async fn test_empty_question_is_rejected() {
    let client = MockLLMClient::new("ok");
    let (pipeline, _) = pipeline(&client).await;

    let err = pipeline
        .answer(&frente_urbana("PDM 2021"), "   ")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidInput(_)));
    assert!(client.received().is_empty());
}

#[tokio::test]
async fn test_generation_failure_surfaces_generic_message() {
    let client = MockLLMClient::failing();
    let (pipeline, _) = pipeline(&client).await;

    let err = pipeline
        .answer(&frente_urbana("PDM 2021"), "Posso construir?")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::LLM(_)));
    assert!(!err.user_message().contains("Mock"));
}

#[tokio::test]
async fn test_embedding_failure_is_reported() {
    let corpus = build_corpus(&VocabularyEmbedder::new(8), &ARTICLES).await;
    let retriever =
        Retriever::new(Arc::new(FailingEmbedder { dimensions: 8 }), Arc::new(corpus)).unwrap();
    let client = MockLLMClient::new("ok");
    let generator = Generator::new(Arc::new(client.clone()), None, Duration::from_secs(5));
    let pipeline = AnswerPipeline::new(retriever, generator, retrieval(1));

    let err = pipeline
        .answer(&frente_urbana("PDM 2021"), "Posso construir?")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::EmbeddingService(_)));
    assert!(client.received().is_empty());
}

// ============= Chat =============

#[tokio::test]
async fn test_chat_retrieves_on_question() {
    let client = MockLLMClient::new("Não é permitida edificação.");
    let (pipeline, _) = pipeline(&client).await;

    let answer = pipeline
        .chat("É permitida edificação em espaço verde de fruição coletiva?")
        .await
        .unwrap();

    match answer {
        Answer::Grounded {
            citations,
            classification,
            ..
        } => {
            assert_eq!(citations, vec!["Artigo 20.º".to_string()]);
            assert!(classification.is_empty());
        }
        other => panic!("unexpected answer: {:?}", other),
    }

    let prompt = &client.received()[0][1].content;
    assert!(!prompt.contains("classified as"));
}

#[tokio::test]
async fn test_citations_only_name_articles_in_prompt() {
    let client = MockLLMClient::new("Resposta.");
    let (retriever, _) = retriever(&ARTICLES).await;
    let generator = Generator::new(Arc::new(client.clone()), None, Duration::from_secs(5));
    let retrieval = RetrievalConfig {
        top_k: 3,
        max_context_chars: 10,
        ..Default::default()
    };
    let pipeline = AnswerPipeline::new(retriever, generator, retrieval);

    let Answer::Grounded { citations, .. } = pipeline.chat("edificação").await.unwrap() else {
        panic!("expected a grounded answer");
    };

    let prompt = &client.received()[0][1].content;
    assert_eq!(citations.len(), 1);
    for label in ["Artigo 10.º", "Artigo 20.º", "Artigo 30.º"] {
        assert_eq!(
            prompt.contains(label),
            citations.iter().any(|c| c == label),
            "{label} cited but not in prompt, or the reverse"
        );
    }
}

// ============= Streaming =============

#[tokio::test]
async fn test_streaming_answer_yields_fragments_in_order() {
    let client = MockLLMClient::streaming(&["Sim", ", ", "é possível", "."]);
    let (pipeline, _) = pipeline(&client).await;

    let answer = pipeline
        .answer_streaming(&frente_urbana("PDM 2021"), "Posso construir?")
        .await
        .unwrap();

    let StreamingAnswer::Grounded {
        stream, citations, ..
    } = answer
    else {
        panic!("expected a grounded answer");
    };

    assert_eq!(citations, vec!["Artigo 10.º".to_string()]);
    assert_eq!(stream.collect_text().await.unwrap(), "Sim, é possível.");
    assert_eq!(client.releases(), 1);
}

#[tokio::test]
async fn test_abandoned_stream_is_released_once() {
    let client = MockLLMClient::streaming(&["Um", " dois", " três"]);
    let (pipeline, _) = pipeline(&client).await;

    let answer = pipeline
        .answer_streaming(&frente_urbana("PDM 2021"), "Posso construir?")
        .await
        .unwrap();
    let StreamingAnswer::Grounded { mut stream, .. } = answer else {
        panic!("expected a grounded answer");
    };

    assert_eq!(stream.next().await.unwrap().unwrap(), "Um");
    assert_eq!(client.releases(), 0);

    drop(stream);
    assert_eq!(client.releases(), 1);
}

#[tokio::test]
async fn test_closed_stream_is_released_once() {
    let client = MockLLMClient::streaming(&["Um", " dois", " três"]);
    let (pipeline, _) = pipeline(&client).await;

    let answer = pipeline.chat_streaming("Qual o uso?").await.unwrap();
    let StreamingAnswer::Grounded { mut stream, .. } = answer else {
        panic!("expected a grounded answer");
    };

    stream.next().await.unwrap().unwrap();
    stream.close();
    stream.close();

    assert!(stream.is_closed());
    assert!(stream.next().await.is_none());
    drop(stream);
    assert_eq!(client.releases(), 1);
}

#[tokio::test]
async fn test_streaming_short_circuits_without_zoning() {
    let client = MockLLMClient::streaming(&["unused"]);
    let (pipeline, _) = pipeline(&client).await;

    let answer = pipeline
        .answer_streaming(&LayerProperties::new(), "Posso construir?")
        .await
        .unwrap();

    assert!(matches!(answer, StreamingAnswer::NoApplicableZoning));
    assert_eq!(client.releases(), 0);
}

// ============= Timeouts =============

#[tokio::test(start_paused = true)]
async fn test_slow_completion_times_out() {
    let client = MockLLMClient::new("late").with_response_delay(Duration::from_secs(30));
    let generator = Generator::new(Arc::new(client), None, Duration::from_secs(2));

    let err = generator.generate("prompt").await.unwrap_err();
    assert!(matches!(err, AppError::Timeout(_)));
}

#[tokio::test(start_paused = true)]
async fn test_stalled_stream_times_out_and_is_released() {
    let client =
        MockLLMClient::streaming(&["a", "b"]).with_fragment_delay(Duration::from_secs(30));
    let generator = Generator::new(Arc::new(client.clone()), None, Duration::from_secs(2));

    let mut stream = generator.generate_streaming("prompt").await.unwrap();

    assert!(matches!(stream.next().await, Some(Err(AppError::Timeout(_)))));
    assert!(stream.next().await.is_none());
    assert_eq!(client.releases(), 1);
}

#[tokio::test]
async fn test_empty_prompt_is_rejected() {
    let client = MockLLMClient::new("ok");
    let generator = Generator::new(
        Arc::new(client.clone()),
        Some("persona".to_string()),
        Duration::from_secs(1),
    );

    assert!(matches!(
        generator.generate("  ").await,
        Err(AppError::InvalidInput(_))
    ));
    assert_eq!(generator.persona(), "persona");
    assert!(client.received().is_empty());
}
