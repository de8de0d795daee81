use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use crosswms_danfe_lib::pdf_utils::pdf_info;
use crosswms_danfe_lib::{validate_xml, DanfeConfig, DanfeRequest, DanfeService};

#[derive(Parser)]
#[command(name = "crosswms-danfe", version, about = "Gera DANFE em PDF a partir de NF-e")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Gera o DANFE de um arquivo XML
    Render {
        xml: PathBuf,
        #[arg(short, long, default_value = "danfe.pdf")]
        output: PathBuf,
    },
    /// Verifica a estrutura de um XML de NF-e
    Validate { xml: PathBuf },
    /// Gera o DANFE pela chave de acesso (XML de DANFE_XML_DIR ou MEUDANFE_API_KEY)
    Key {
        access_key: String,
        /// Pasta com os XMLs baixados; sobrescreve DANFE_XML_DIR
        #[arg(long)]
        xml_dir: Option<PathBuf>,
        #[arg(short, long, default_value = "danfe.pdf")]
        output: PathBuf,
    },
    /// Une os DANFEs de vários XMLs em um único PDF
    Batch {
        #[arg(required = true)]
        xmls: Vec<PathBuf>,
        #[arg(short, long, default_value = "danfes.pdf")]
        output: PathBuf,
    },
}

fn read_xml(path: &PathBuf) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Erro ao ler '{}': {}", path.display(), e))
}

fn write_pdf(path: &PathBuf, bytes: &[u8]) -> Result<(), String> {
    fs::write(path, bytes).map_err(|e| format!("Erro ao salvar '{}': {}", path.display(), e))?;
    match pdf_info(bytes) {
        Ok(info) => info!(path = %path.display(), bytes = info.size, pages = info.page_count, "PDF salvo"),
        Err(_) => info!(path = %path.display(), bytes = bytes.len(), "PDF salvo"),
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), String> {
    let mut config = DanfeConfig::from_env();
    if let Command::Key { xml_dir: Some(dir), .. } = &cli.command {
        config.xml_dir = Some(dir.clone());
    }
    let service = DanfeService::from_config(&config).map_err(|e| e.to_string())?;

    match cli.command {
        Command::Render { xml, output } => {
            let generated = service
                .produce_document(DanfeRequest::Xml(read_xml(&xml)?))
                .await
                .map_err(|e| e.to_string())?;
            info!(method = %generated.method, "DANFE gerado");
            write_pdf(&output, &generated.pdf)
        }
        Command::Validate { xml } => {
            let report = validate_xml(&read_xml(&xml)?);
            let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
            println!("{}", json);
            if report.valid {
                Ok(())
            } else {
                Err("XML inválido".into())
            }
        }
        Command::Key { access_key, output, .. } => {
            let generated = service
                .produce_document(DanfeRequest::AccessKey(access_key))
                .await
                .map_err(|e| e.to_string())?;
            write_pdf(&output, &generated.pdf)
        }
        Command::Batch { xmls, output } => {
            let requests = xmls
                .iter()
                .map(|p| read_xml(p).map(DanfeRequest::Xml))
                .collect::<Result<Vec<_>, _>>()?;
            let outcome = service.produce_batch(requests).await.map_err(|e| e.to_string())?;
            for (index, message) in &outcome.failures {
                error!(file = %xmls[*index].display(), "{}", message);
            }
            write_pdf(&output, &outcome.pdf)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{}", message);
            ExitCode::FAILURE
        }
    }
}
