//! `toolchat chat`: Single message or interactive chat on one thread.

use std::io::Write;
use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};
use toolchat_core::message::ConversationId;

pub async fn run(
    config_path: Option<&Path>,
    thread: Option<String>,
    message: Option<String>,
) -> anyhow::Result<()> {
    let config = super::load_with_key(config_path)?;
    let agent = toolchat_agent::build_from_config(&config).await?;
    let thread_id = ConversationId::from(thread.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()));

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let turn = agent.run(&thread_id, &msg).await;
        eprint!("\r              \r");
        println!("{}", turn?.response);
        return Ok(());
    }

    println!();
    println!("  toolchat — interactive mode");
    println!();
    println!("  Model:   {}", config.default_model);
    println!("  Tools:   {}", agent.tools().names().join(", "));
    println!("  Thread:  {thread_id}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        eprint!("  ...");
        match agent.run(&thread_id, line).await {
            Ok(turn) => {
                eprint!("\r     \r");
                println!();
                for text in turn.response.lines() {
                    println!("  Assistant > {text}");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Resume this conversation with: toolchat chat --thread {thread_id}");
    println!();
    Ok(())
}
