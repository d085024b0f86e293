use std::env;
use std::fs;

use anyhow::{bail, Context};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use eve_access::{ClientConfig, DataAccess, Mode, RequestDescriptor, RestDataAccess};

const USAGE: &str = "usage: eve_access <query.json> [--config <config.json>] [--create] [--send]";

struct Args {
    query_path: String,
    config_path: String,
    mode: Mode,
    send: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut query_path = None;
    let mut config_path = "eve_config.json".to_string();
    let mut mode = Mode::Read;
    let mut send = false;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = args.next().context("--config needs a path")?,
            "--create" => mode = Mode::Create,
            "--send" => send = true,
            "-h" | "--help" => bail!(USAGE),
            _ if query_path.is_none() => query_path = Some(arg),
            _ => bail!("unexpected argument {}\n{}", arg, USAGE),
        }
    }

    Ok(Args {
        query_path: query_path.context(USAGE)?,
        config_path,
        mode,
        send,
    })
}

/// 创建客户端，优先使用JSON配置，失败时使用默认配置
fn create_client(config_path: &str) -> RestDataAccess {
    match ClientConfig::from_json_file(config_path) {
        Ok(config) => {
            println!("✅ 成功从JSON配置文件加载客户端配置: {}", config_path);
            if let Some(source) = &config.data_source {
                println!("  数据源: {}", source);
            }
            for (resource, fields) in &config.field_mappings.resources {
                for (field, mapped) in fields {
                    println!("  {}.{} -> {}", resource, field, mapped);
                }
            }
            RestDataAccess::from_config(&config)
        }
        Err(e) => {
            println!("⚠️ 无法加载JSON配置文件 ({}), 使用默认配置", e);
            RestDataAccess::new()
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = parse_args()?;
    println!("--- Eve Access: 查询描述到 REST 请求 ---");

    println!("\n[配置信息]:");
    let client = create_client(&args.config_path);

    println!("\n[步骤 1]: 读取查询描述 {}", args.query_path);
    let content = fs::read_to_string(&args.query_path)
        .with_context(|| format!("cannot read query file {}", args.query_path))?;
    let descriptor: RequestDescriptor = serde_json::from_str(&content)
        .with_context(|| format!("cannot parse query file {}", args.query_path))?;

    println!("\n[步骤 2]: 编译请求...");
    let request = client.prepare(&descriptor, args.mode)?;
    println!("{} {}", request.method, request.path);
    for (name, value) in &request.query {
        println!("  ?{}={}", name, value);
    }
    for (name, value) in &request.headers {
        println!("  {}: {}", name, value);
    }
    if let Some(body) = &request.body {
        println!("  body: {}", body);
    }

    if !args.send {
        return Ok(());
    }

    println!("\n[步骤 3]: 发送请求...");
    let response = client.execute::<Value>(&descriptor, args.mode)?;
    println!("状态: {:?} ({:?})", response.status, response.http_status);
    if let Some(message) = &response.error_message {
        println!("错误: {}", message);
    }
    if let Some(content) = &response.content {
        println!("{}", serde_json::to_string_pretty(content)?);
    }

    Ok(())
}
