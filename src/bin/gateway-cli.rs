use clap::{Parser, Subcommand, ValueEnum};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the API gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "GATEWAY_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Range {
    Hour,
    Day,
    Week,
}

impl Range {
    fn as_str(self) -> &'static str {
        match self {
            Range::Hour => "hour",
            Range::Day => "day",
            Range::Week => "week",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status and last route refresh
    Status,
    /// Show request and rejection totals
    Summary,
    /// Show per-route metrics
    RouteMetrics,
    /// Show rejection counts by reason
    Rejections,
    /// Show request time series
    Timeseries {
        #[arg(short, long, value_enum, default_value = "hour")]
        range: Range,
        /// Restrict to one route id
        #[arg(long)]
        route: Option<String>,
    },
    /// List the live route table
    Routes,
    /// Reload routes from the route source now
    Refresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let base = cli.url.trim_end_matches('/');
    let request = match cli.command {
        Commands::Status => client.get(format!("{base}/admin/status")),
        Commands::Summary => client.get(format!("{base}/admin/metrics/summary")),
        Commands::RouteMetrics => client.get(format!("{base}/admin/metrics/routes")),
        Commands::Rejections => client.get(format!("{base}/admin/metrics/rejections")),
        Commands::Timeseries { range, route } => {
            let mut query = vec![("range", range.as_str().to_string())];
            if let Some(route) = route {
                query.push(("route", route));
            }
            client
                .get(format!("{base}/admin/metrics/timeseries"))
                .query(&query)
        }
        Commands::Routes => client.get(format!("{base}/admin/routes")),
        Commands::Refresh => client.post(format!("{base}/admin/routes/refresh")),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
