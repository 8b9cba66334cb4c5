// SearchBar CLI - drive the query bar engine from the terminal

mod config;
mod fixtures;

use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use config::SearchbarConfig;
use fixtures::{read_json, StaticTerms};
use searchbar_core::{
    normalize_field_caps_value, CanonicalField, DatasourceParams, FieldAbstraction,
    FieldAbstractionMap, FieldSubType, SearchBackend, SuggestionType, TimeRange,
};
use searchbar_dsl::{
    build_filters, build_grouped_query, build_logs_query, build_query_from_kql,
    build_series_query, build_ungrouped_query, get_grouped_results, group_series,
    parse_interval, reshape_aggregation_response, ElasticsearchClient, LogsTarget, SeriesTarget,
};
use searchbar_suggest::{FieldCatalog, RecentSearches, SuggestionContext, SuggestionEngine};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "searchbar")]
#[command(version = "0.1.0")]
#[command(about = "KQL query bar engine: suggestions, parsing and query DSL", long_about = None)]
struct Cli {
    /// Elasticsearch URL; fixtures are used when unset
    #[arg(short, long, env = "ELASTICSEARCH_URL")]
    url: Option<String>,

    /// Config file
    #[arg(short, long, default_value = "searchbar.toml")]
    config: PathBuf,

    /// Index pattern, overrides the config
    #[arg(short, long)]
    index: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Suggest completions at the caret
    Suggest {
        /// Query text
        query: String,

        /// Caret byte offset (default: end of query)
        #[arg(long)]
        caret: Option<usize>,

        /// Start of the selection, if any
        #[arg(long)]
        selection_start: Option<usize>,

        /// Raw _field_caps response
        #[arg(short, long)]
        fields: Option<PathBuf>,

        /// Field values as { "field": [values] }
        #[arg(short, long)]
        values: Option<PathBuf>,

        /// Field abstractions as a JSON array
        #[arg(short, long)]
        abstractions: Option<PathBuf>,

        /// Recent searches, oldest first
        #[arg(short, long)]
        recent: Vec<String>,

        /// Print the cursor node only
        #[arg(long)]
        cursor: bool,
    },

    /// Normalize field capabilities
    Normalize {
        /// Raw _field_caps response
        #[arg(short, long)]
        fields: Option<PathBuf>,
    },

    /// Build (and optionally run) the rule filters from the config
    Filters {
        /// Execute the grouped query against the cluster
        #[arg(long)]
        run: bool,
    },

    /// Convert a KQL query to query DSL
    Kql {
        /// Query text
        query: String,

        /// Raw _field_caps response, for nested and date fields
        #[arg(short, long)]
        fields: Option<PathBuf>,
    },

    /// Build a chart query and reshape its response
    Series {
        /// Series target JSON
        #[arg(short, long)]
        target: PathBuf,

        /// KQL filter
        #[arg(short, long, default_value = "")]
        query: String,

        /// Window ending now, e.g. 15m
        #[arg(short, long, default_value = "1h")]
        last: String,

        /// Saved response to reshape instead of querying the cluster
        #[arg(short, long)]
        response: Option<PathBuf>,

        /// Raw _field_caps response, for nested and date fields
        #[arg(short, long)]
        fields: Option<PathBuf>,

        /// Build a raw log list query instead
        #[arg(long)]
        logs: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = SearchbarConfig::load(&cli.config)?;
    let params = config.datasource(cli.index.as_deref());
    let client = cli.url.as_deref().map(ElasticsearchClient::new);

    match cli.command {
        Commands::Suggest {
            query,
            caret,
            selection_start,
            fields,
            values,
            abstractions,
            recent,
            cursor,
        } => {
            let fields = load_fields(client.as_ref(), fields, &params).await?;
            let recent = recent_history(config.suggest.recent_searches_limit, &recent);
            let caret = caret.unwrap_or(query.len());
            let selection_start = selection_start.unwrap_or(caret);

            let mut ctx = SuggestionContext::new(fields, params.clone())
                .with_time_range(TimeRange::last(
                    config.rule.timestamp_field.clone(),
                    chrono::Duration::milliseconds(config.rule.interval().as_millis()),
                    Utc::now(),
                ))
                .with_recent_searches(recent.snapshot());
            if let Some(path) = abstractions {
                let list: Vec<FieldAbstraction> = serde_json::from_value(read_json(&path)?)?;
                ctx = ctx.with_abstraction(Arc::new(FieldAbstractionMap::new(list)));
            }
            if let Some(path) = values {
                ctx = ctx.with_terms(Arc::new(StaticTerms::from_value(read_json(&path)?)));
            } else if let Some(client) = &client {
                ctx = ctx.with_terms(Arc::new(client.clone()));
            }

            let engine = SuggestionEngine::new(config.suggest.clone());
            if cursor {
                let node = engine.cursor_node(&query, caret, &ctx);
                println!("{}", serde_json::to_string_pretty(&node)?);
                return Ok(());
            }
            let suggestions = engine
                .get_suggestions(&query, selection_start, caret, &ctx)
                .await;
            show_suggestions(&query, &suggestions);
        }
        Commands::Normalize { fields } => {
            let fields = load_fields(client.as_ref(), fields, &params).await?;
            show_fields(&fields);
        }
        Commands::Filters { run } => {
            run_filters(&config, client.as_ref(), &params, run).await?;
        }
        Commands::Kql { query, fields } => {
            let dsl = kql_filter(client.as_ref(), fields, &params, &query).await?;
            println!("{}", serde_json::to_string_pretty(&dsl)?);
        }
        Commands::Series {
            target,
            query,
            last,
            response,
            fields,
            logs,
        } => {
            let target = read_json(&target)?;
            let window = parse_interval(&last)?;
            let dsl = kql_filter(client.as_ref(), fields, &params, &query).await?;

            if logs {
                let target: LogsTarget = serde_json::from_value(target)?;
                let range = window_range(&target.date_field, window.as_millis());
                let body = build_logs_query(&target, &range, Some(dsl));
                println!("{}", serde_json::to_string_pretty(&body)?);
                return Ok(());
            }

            let target: SeriesTarget = serde_json::from_value(target)?;
            let range = window_range(&target.date_field, window.as_millis());
            let body = build_series_query(&target, &range, Some(dsl))?;

            let raw = match (response, &client) {
                (Some(path), _) => read_json(&path)?,
                (None, Some(client)) => client.search(&params, &body).await?,
                (None, None) => {
                    println!("{}", serde_json::to_string_pretty(&body)?);
                    return Ok(());
                }
            };
            show_series(&reshape_aggregation_response(&raw, &target));
        }
    }

    Ok(())
}

fn window_range(field: &str, span_ms: i64) -> TimeRange {
    let lte = Utc::now().timestamp_millis();
    TimeRange::new(field, lte.saturating_sub(span_ms), lte)
}

// fixture file wins over the cluster
async fn load_fields(
    client: Option<&ElasticsearchClient>,
    path: Option<PathBuf>,
    params: &DatasourceParams,
) -> Result<Arc<[CanonicalField]>, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        let fields = normalize_field_caps_value(&read_json(&path)?);
        info!(fields = fields.len(), "Loaded field capabilities from file");
        return Ok(Arc::from(fields));
    }
    let catalog = FieldCatalog::default();
    match client {
        Some(client) => {
            catalog.refresh(client, params).await?;
        }
        None => warn!("No field capabilities given, field suggestions will be empty"),
    }
    Ok(catalog.snapshot())
}

// later --recent entries count as more recent
fn recent_history(limit: usize, entries: &[String]) -> RecentSearches {
    let mut recent = RecentSearches::new(limit);
    for entry in entries {
        recent.push(entry);
    }
    recent
}

async fn kql_filter(
    client: Option<&ElasticsearchClient>,
    fields: Option<PathBuf>,
    params: &DatasourceParams,
    query: &str,
) -> Result<Value, Box<dyn std::error::Error>> {
    let fields = load_fields(client, fields, params).await?;
    Ok(build_query_from_kql(query, &fields)?)
}

async fn run_filters(
    config: &SearchbarConfig,
    client: Option<&ElasticsearchClient>,
    params: &DatasourceParams,
    run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let rule = &config.rule;
    let filters = build_filters(
        &rule.criteria,
        &rule.interval(),
        &rule.timestamp_field,
        None,
        Utc::now(),
    )?;

    println!("\n{}", "Filters".cyan().bold());
    println!("{}", serde_json::to_string_pretty(&filters)?);

    let query = if rule.group_by.is_empty() {
        build_ungrouped_query(&filters)
    } else {
        build_grouped_query(rule, &filters)
    };
    println!("\n{}", "Query".cyan().bold());
    println!("{}", serde_json::to_string_pretty(&query)?);

    if !run {
        return Ok(());
    }
    let Some(client) = client else {
        println!("{} --run needs --url", "Error:".red().bold());
        return Ok(());
    };

    if rule.group_by.is_empty() {
        let response = client.search(params, &query).await?;
        let total = response
            .pointer("/hits/total/value")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        println!("\n{} {}", "Matches:".dimmed(), total.to_string().green());
        return Ok(());
    }

    let groups = get_grouped_results(client, params, query).await?;
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Group", "Docs (padded window)", "Docs (window)"]);
    for group in &groups {
        table.add_row(vec![
            group.group_name(),
            group.doc_count.to_string(),
            group.filtered_results.doc_count.to_string(),
        ]);
    }
    println!("{table}");
    println!("\n{} {}", "Groups:".dimmed(), groups.len().to_string().green());
    Ok(())
}

fn show_suggestions(query: &str, suggestions: &[searchbar_core::Suggestion]) {
    if suggestions.is_empty() {
        println!("{}", "No suggestions.".yellow());
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Type", "Text", "Range", "Result"]);

    for s in suggestions {
        let kind = match s.kind {
            SuggestionType::Field => "field".cyan().to_string(),
            SuggestionType::Value => "value".green().to_string(),
            SuggestionType::Operator => "operator".yellow().to_string(),
            SuggestionType::Conjunction => "conjunction".magenta().to_string(),
            SuggestionType::RecentSearch => "recent".dimmed().to_string(),
        };
        let (applied, _) = s.apply(query);
        table.add_row(vec![
            kind,
            s.text.clone(),
            format!("{}..{}", s.start, s.end),
            applied,
        ]);
    }

    println!("{table}");
}

fn show_fields(fields: &[CanonicalField]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Name", "Type", "ES types", "Aggregatable", "Sub-type"]);

    for f in fields {
        let sub_type = match &f.sub_type {
            Some(FieldSubType::Multi { parent }) => format!("multi of {parent}"),
            Some(FieldSubType::Nested { path }) => format!("nested in {path}"),
            None => String::new(),
        };
        let es_types = f.es_types.iter().cloned().collect::<Vec<_>>().join(", ");
        let field_type = if f.conflict_descriptions.is_some() {
            f.field_type.as_str().red().to_string()
        } else {
            f.field_type.as_str().to_string()
        };
        table.add_row(vec![
            f.name.clone(),
            field_type,
            es_types,
            if f.aggregatable { "yes" } else { "no" }.to_string(),
            sub_type,
        ]);
    }

    println!("{table}");
    println!("\n{} {}", "Fields:".dimmed(), fields.len().to_string().green());
}

fn show_series(points: &[searchbar_dsl::SeriesPoint]) {
    let series = group_series(points.to_vec());
    if series.is_empty() {
        println!("{}", "No data.".yellow());
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Series", "Points", "Last", "Max"]);

    for s in &series {
        let values: Vec<f64> = s.points.iter().filter_map(|p| p.value).collect();
        let last = s
            .points
            .last()
            .and_then(|p| p.value)
            .map(|v| format!("{v:.2}"))
            .unwrap_or_else(|| "-".to_string());
        let max = values
            .iter()
            .copied()
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
            .map(|v| format!("{v:.2}"))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![s.key.clone(), s.points.len().to_string(), last, max]);
    }

    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recent_history_keeps_newest_within_limit() {
        let entries: Vec<String> = ["a:1", "b:2", "a:1", "c:3"].map(String::from).to_vec();
        assert_eq!(recent_history(2, &entries).snapshot(), vec!["c:3", "a:1"]);
        assert!(recent_history(0, &entries).is_empty());
    }

    #[tokio::test]
    async fn test_kql_filter_uses_catalog_fields() {
        let path = std::env::temp_dir().join(format!("searchbar-caps-{}.json", std::process::id()));
        let caps = json!({
            "fields": {
                "user": { "nested": { "type": "nested", "searchable": false, "aggregatable": false } },
                "user.first": { "keyword": { "type": "keyword", "searchable": true, "aggregatable": true } }
            }
        });
        std::fs::write(&path, caps.to_string()).unwrap();

        let params = DatasourceParams::new("logs");
        let with_fields = kql_filter(None, Some(path.clone()), &params, "user.first:jo")
            .await
            .unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(with_fields["nested"]["path"], "user");
        assert_eq!(
            with_fields["nested"]["query"],
            json!({ "match": { "user.first": "jo" } })
        );

        let without = kql_filter(None, None, &params, "user.first:jo").await.unwrap();
        assert_eq!(without, json!({ "match": { "user.first": "jo" } }));
    }
}
