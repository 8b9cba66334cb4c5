use async_trait::async_trait;
use searchbar_core::{
    normalize_field_caps_value, BackendError, DatasourceParams, FieldAbstraction,
    FieldAbstractionMap, SuggestionType, TermsRequest, TermsSource, TimeRange,
};
use searchbar_suggest::{
    FieldCatalog, RecentSearches, SuggestConfig, SuggestionContext, SuggestionEngine,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct FakeTerms {
    values: Vec<Value>,
    delay: Duration,
    requests: Mutex<Vec<TermsRequest>>,
}

impl FakeTerms {
    fn new(values: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            values,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl TermsSource for FakeTerms {
    async fn terms(
        &self,
        _params: &DatasourceParams,
        request: &TermsRequest,
    ) -> Result<Vec<Value>, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        tokio::time::sleep(self.delay).await;
        Ok(self.values.clone())
    }
}

fn field_caps() -> Value {
    json!({
        "indices": ["logs-web"],
        "fields": {
            "@timestamp": { "date": { "type": "date", "searchable": true, "aggregatable": true } },
            "response": { "keyword": { "type": "keyword", "searchable": true, "aggregatable": true } },
            "bytes": { "long": { "type": "long", "searchable": true, "aggregatable": true } },
            "message": { "text": { "type": "text", "searchable": true, "aggregatable": false } },
            "user": { "nested": { "type": "nested", "searchable": false, "aggregatable": false } },
            "user.first": { "keyword": { "type": "keyword", "searchable": true, "aggregatable": true } },
            "_source": { "_source": { "type": "_source", "searchable": false, "aggregatable": false, "metadata_field": true } }
        }
    })
}

fn context(terms: Arc<FakeTerms>) -> SuggestionContext {
    let catalog = FieldCatalog::new(normalize_field_caps_value(&field_caps()));
    SuggestionContext::new(catalog.snapshot(), DatasourceParams::new("logs-web"))
        .with_terms(terms)
        .with_time_range(TimeRange::new("@timestamp", 0, 1_000))
}

fn texts(suggestions: &[searchbar_core::Suggestion]) -> Vec<&str> {
    suggestions.iter().map(|s| s.text.as_str()).collect()
}

#[tokio::test]
async fn test_typing_a_full_clause() {
    let terms = FakeTerms::new(vec![json!("200"), json!("404"), json!("503")]);
    let ctx = context(terms.clone());
    let engine = SuggestionEngine::new(SuggestConfig::default());

    let fields = engine.get_suggestions("resp", 4, 4, &ctx).await;
    assert_eq!(texts(&fields), vec!["response "]);
    let (query, caret) = fields[0].apply("resp");
    assert_eq!((query.as_str(), caret), ("response ", 9));

    let operators = engine.get_suggestions(&query, caret, caret, &ctx).await;
    let colon = operators
        .iter()
        .find(|s| s.kind == SuggestionType::Operator && s.text == ": ")
        .unwrap();
    let (query, caret) = colon.apply(&query);
    assert_eq!(query, "response : ");

    let values = engine.get_suggestions(&query, caret, caret, &ctx).await;
    assert_eq!(texts(&values), vec!["\"200\" ", "\"404\" ", "\"503\" "]);
    let (query, caret) = values[1].apply(&query);
    assert_eq!(query, "response : \"404\" ");

    let conjunctions = engine.get_suggestions(&query, caret, caret, &ctx).await;
    assert_eq!(texts(&conjunctions), vec!["and ", "or "]);

    let requests = terms.requests.lock().unwrap();
    assert_eq!(requests[0].field, "response");
    assert_eq!(requests[0].time_range.as_ref().map(|r| r.lte), Some(1_000));
}

#[tokio::test]
async fn test_nested_round_trip() {
    let ctx = context(FakeTerms::new(vec![json!("Jo")]));
    let engine = SuggestionEngine::new(SuggestConfig::default());

    let fields = engine.get_suggestions("fir", 3, 3, &ctx).await;
    assert_eq!(texts(&fields), vec!["user:{ first }"]);
    let (query, caret) = fields[0].apply("fir");
    assert_eq!(&query[..caret], "user:{ first");

    // caret sits inside the braces, after the field name
    let typed = format!("{}:{}", &query[..caret], &query[caret..]);
    let values = engine.get_suggestions(&typed, caret + 1, caret + 1, &ctx).await;
    assert_eq!(texts(&values), vec!["\"Jo\" "]);
}

#[tokio::test]
async fn test_abstraction_overlay() {
    let terms = FakeTerms::new(vec![json!("200")]);
    let map = FieldAbstractionMap::new([
        FieldAbstraction::new("status", "response"),
        FieldAbstraction::new("size", "bytes").hidden(),
    ]);
    let ctx = context(terms.clone()).with_abstraction(Arc::new(map));
    let engine = SuggestionEngine::new(SuggestConfig::default());

    let fields = engine.get_suggestions("s", 1, 1, &ctx).await;
    assert!(texts(&fields).contains(&"status "));
    assert!(!texts(&fields).iter().any(|t| t.starts_with("size") || t.starts_with("bytes")));

    let values = engine.get_suggestions("status:", 7, 7, &ctx).await;
    assert_eq!(texts(&values), vec!["\"200\" "]);
    assert_eq!(terms.requests.lock().unwrap()[0].field, "response");
}

#[tokio::test]
async fn test_recent_searches_always_appended() {
    let mut recent = RecentSearches::new(3);
    recent.push("bytes > 1000");
    recent.push("response:404");

    let ctx = context(FakeTerms::new(Vec::new())).with_recent_searches(recent.snapshot());
    let engine = SuggestionEngine::new(SuggestConfig::default());

    // a degraded parse still surfaces recent searches
    let suggestions = engine.get_suggestions("a:b)", 4, 4, &ctx).await;
    assert!(suggestions.is_empty());

    let suggestions = engine.get_suggestions("4", 1, 1, &ctx).await;
    let recent: Vec<&str> = suggestions
        .iter()
        .filter(|s| s.kind == SuggestionType::RecentSearch)
        .map(|s| s.text.as_str())
        .collect();
    assert_eq!(recent, vec!["response:404"]);
}

#[tokio::test]
async fn test_concurrent_calls_are_independent() {
    let ctx = context(FakeTerms::new(vec![json!("200")]));
    let engine = Arc::new(SuggestionEngine::new(SuggestConfig::default()));

    let (a, b) = tokio::join!(
        engine.get_suggestions("response:", 9, 9, &ctx),
        engine.get_suggestions("resp", 4, 4, &ctx),
    );
    assert_eq!(texts(&a), vec!["\"200\" "]);
    assert_eq!(texts(&b), vec!["response "]);
}

#[tokio::test(start_paused = true)]
async fn test_debounced_keystrokes() {
    let ctx = context(FakeTerms::new(vec![json!("200")]));
    let engine = SuggestionEngine::new(SuggestConfig::default());

    let (first, second) = tokio::join!(
        engine.get_suggestions_debounced("respo", 5, 5, &ctx),
        engine.get_suggestions_debounced("respon", 6, 6, &ctx),
    );
    assert!(first.is_none());
    assert_eq!(second.map(|s| s.len()), Some(1));
}
