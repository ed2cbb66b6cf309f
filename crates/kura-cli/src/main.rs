use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use kura_core::config::{mask_secret, Config, API_KEY_ENV};
use kura_core::{table, workspace, Event, FailureCount, Reporter, TracingReporter};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kura")]
#[command(author, version, about = "Anthropic API ワークスペースのファイル管理ツール", long_about = None)]
struct Cli {
    /// 詳細ログを表示
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// API への疎通確認
    Test {
        /// このファイルを添付して要約を依頼する
        #[arg(long)]
        file_id: Option<String>,
    },

    /// ファイルをアップロード (.pdf / .txt / .md / .json)
    Upload {
        /// アップロードするファイル
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// ワークスペースのファイル一覧
    List {
        /// JSON で出力
        #[arg(long)]
        json: bool,
    },

    /// ファイルを削除
    Delete {
        /// 削除するファイル ID
        file_id: String,
    },

    /// ワークスペースのファイルをすべて削除
    DeleteAll {
        /// 確認せずに削除
        #[arg(short, long)]
        yes: bool,
    },

    /// 設定ファイルの表示・更新
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// シェル補完スクリプトを出力
    Completions {
        /// 対象シェル
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// 現在の設定を表示
    Show,

    /// 設定を更新
    Set {
        #[arg(long)]
        api_key: Option<String>,

        #[arg(long)]
        base_url: Option<String>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ok = match cli.command {
        Commands::Test { file_id } => run_test(file_id.as_deref())?,
        Commands::Upload { paths } => run_upload(&paths)?,
        Commands::List { json } => run_list(json)?,
        Commands::Delete { file_id } => run_delete(&file_id)?,
        Commands::DeleteAll { yes } => run_delete_all(yes)?,
        Commands::Config { action } => match action {
            ConfigAction::Show => show_config()?,
            ConfigAction::Set {
                api_key,
                base_url,
                model,
                timeout_secs,
            } => set_config(api_key, base_url, model, timeout_secs)?,
        },
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "kura", &mut io::stdout());
            true
        }
    };

    if !ok {
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("KURA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// スピナーを出しつつイベントをコンソールに表示する Reporter
struct ConsoleReporter {
    spinner: ProgressBar,
}

impl ConsoleReporter {
    fn start(message: &str) -> Result<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(std::time::Duration::from_millis(100));
        Ok(Self { spinner })
    }

    fn set_message(&self, message: &str) {
        self.spinner.set_message(message.to_string());
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, event: Event) {
        self.spinner.suspend(|| print_event(&event));
    }
}

fn print_event(event: &Event) {
    match event {
        Event::ConnectionOk { reply } => {
            println!("{}", "✅ API 接続テスト成功".green().bold());
            println!("{} {}", "💬 応答:".cyan(), reply);
        }
        Event::ConnectionFailed { error } => {
            println!("{}", "❌ API 接続テスト失敗".red().bold());
            println!("   {}", error.dimmed());
        }
        Event::Uploaded { record } => {
            println!(
                "{} {}",
                "✅ アップロードしました:".green(),
                record.filename.bright_blue()
            );
            println!("   ID: {}", record.id.yellow().bold());
            println!("   サイズ: {}", record.formatted_size().yellow());
        }
        Event::UploadFailed { filename, error } => {
            println!(
                "{} {}",
                "❌ アップロードに失敗しました:".red(),
                filename.bright_blue()
            );
            println!("   {}", error.dimmed());
        }
        Event::FilesListed { records } => {
            let total: u64 = records.iter().map(|r| r.size_bytes).sum();
            println!(
                "\n{} 件のファイル (合計: {})\n",
                records.len().to_string().yellow().bold(),
                kura_core::utils::format_size(total).yellow().bold()
            );
            println!("{}", table::render_files(records));
        }
        Event::NoFiles => {
            println!("{}", "✨ ワークスペースにファイルはありません".green());
        }
        Event::ListFailed { error } => {
            println!("{}", "❌ ファイル一覧の取得に失敗しました".red());
            println!("   {}", error.dimmed());
        }
        Event::Deleted { file_id } => {
            println!("{} {}", "🗑️  削除しました:".green(), file_id.bright_blue());
        }
        Event::DeleteFailed { file_id, error } => {
            println!("{} {}", "❌ 削除に失敗しました:".red(), file_id.bright_blue());
            if let Some(error) = error {
                println!("   {}", error.dimmed());
            }
        }
        Event::DeleteAllSummary { deleted, total } => {
            let line = format!("{} / {} 件のファイルを削除しました", deleted, total);
            if deleted == total {
                println!("\n{} {}", "✅".green(), line.green().bold());
            } else {
                println!("\n{} {}", "⚠".yellow(), line.yellow().bold());
            }
        }
    }
}

fn load_client() -> Result<kura_core::anthropic::AnthropicClient> {
    let config = Config::load()?;
    config.create_client().with_context(|| {
        format!(
            "API クライアントを作成できません。{} を設定するか `kura config set --api-key` を実行してください",
            API_KEY_ENV
        )
    })
}

fn run_test(file_id: Option<&str>) -> Result<bool> {
    println!("{}", "🔌 Anthropic API に接続中...".cyan().bold());
    let client = load_client()?;

    let reporter = FailureCount::new(ConsoleReporter::start("応答を待っています...")?);
    let ok = workspace::test_connection(&client, &reporter, file_id);
    reporter.inner().finish();

    Ok(ok)
}

fn run_upload(paths: &[PathBuf]) -> Result<bool> {
    let client = load_client()?;
    let reporter = FailureCount::new(ConsoleReporter::start("アップロード準備中...")?);
    let mut uploaded = 0;

    for path in paths {
        reporter.inner().set_message(&format!("{} をアップロード中...", path.display()));
        match workspace::upload_file_to_workspace(&client, &reporter, path) {
            Ok(Some(_)) => uploaded += 1,
            Ok(None) => {}
            Err(e) => {
                reporter.inner().finish();
                return Err(e).with_context(|| format!("{} をアップロードできません", path.display()));
            }
        }
    }
    reporter.inner().finish();

    if paths.len() > 1 {
        println!(
            "\n{} {} / {} 件をアップロードしました",
            "📤".cyan(),
            uploaded.to_string().green().bold(),
            paths.len()
        );
    }

    Ok(uploaded == paths.len())
}

fn run_list(json: bool) -> Result<bool> {
    let client = load_client()?;

    if json {
        let reporter = FailureCount::new(TracingReporter);
        let records = workspace::list_files_in_workspace(&client, &reporter);
        if reporter.failures() > 0 {
            return Ok(false);
        }
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(true);
    }

    println!("{}", "📂 ワークスペースのファイルを取得中...".cyan().bold());
    let reporter = FailureCount::new(ConsoleReporter::start("GET /v1/files")?);
    workspace::list_files_in_workspace(&client, &reporter);
    reporter.inner().finish();

    Ok(reporter.failures() == 0)
}

fn run_delete(file_id: &str) -> Result<bool> {
    let client = load_client()?;

    let reporter = FailureCount::new(ConsoleReporter::start(&format!("{} を削除中...", file_id))?);
    let deleted = workspace::delete_file_from_workspace(&client, &reporter, file_id);
    reporter.inner().finish();

    Ok(deleted?)
}

fn run_delete_all(yes: bool) -> Result<bool> {
    let client = load_client()?;

    if yes {
        println!("\n{}", "🗑️  削除中...".red().bold());
        let reporter = FailureCount::new(ConsoleReporter::start("DELETE /v1/files")?);
        let deleted = workspace::delete_all_files_from_workspace(&client, &reporter);
        reporter.inner().finish();

        tracing::debug!(deleted, failures = reporter.failures(), "delete-all finished");
        return Ok(reporter.failures() == 0);
    }

    let reporter = FailureCount::new(ConsoleReporter::start("ファイル一覧を取得中...")?);
    let records = workspace::list_files_in_workspace(&client, &reporter);
    reporter.inner().finish();

    if records.is_empty() {
        return Ok(reporter.failures() == 0);
    }

    print!(
        "\n{} 上記 {} 件のファイルをすべて削除しますか? (y/N): ",
        "⚠".yellow().bold(),
        records.len()
    );
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    if !input.trim().eq_ignore_ascii_case("y") {
        println!("{}", "キャンセルされました".yellow());
        return Ok(true);
    }

    // 確認した一覧だけを削除する
    println!("\n{}", "🗑️  削除中...".red().bold());
    let reporter = FailureCount::new(ConsoleReporter::start("DELETE /v1/files")?);
    let deleted = workspace::delete_files_from_workspace(&client, &reporter, &records);
    reporter.inner().finish();

    tracing::debug!(deleted, failures = reporter.failures(), "delete-all finished");
    Ok(reporter.failures() == 0)
}

fn show_config() -> Result<bool> {
    let path = Config::config_path()?;
    let config = Config::load()?;

    println!("{} {}", "📄 設定ファイル:".cyan(), path.display());

    let api_key = match config.get_api_key() {
        Ok(key) => mask_secret(&key),
        Err(_) => "(未設定)".dimmed().to_string(),
    };
    println!("  api_key:      {}", api_key);
    println!("  base_url:     {}", config.get_base_url());
    println!("  model:        {}", config.get_model());
    println!("  timeout_secs: {}", config.get_timeout().as_secs());

    Ok(true)
}

fn set_config(
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
) -> Result<bool> {
    if api_key.is_none() && base_url.is_none() && model.is_none() && timeout_secs.is_none() {
        println!(
            "{} {}",
            "💡".cyan(),
            "--api-key / --base-url / --model / --timeout-secs のいずれかを指定してください".dimmed()
        );
        return Ok(false);
    }

    let mut config = Config::load()?;
    let anthropic = config.anthropic_mut();

    if let Some(api_key) = api_key {
        anthropic.api_key = Some(api_key);
    }
    if let Some(base_url) = base_url {
        anthropic.base_url = Some(base_url);
    }
    if let Some(model) = model {
        anthropic.model = Some(model);
    }
    if let Some(timeout_secs) = timeout_secs {
        anthropic.timeout_secs = Some(timeout_secs);
    }

    config.save()?;
    println!(
        "{} {}",
        "✅ 設定を保存しました:".green(),
        Config::config_path()?.display()
    );

    Ok(true)
}
