use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use memomines::parser::MoveEvent;
use memomines::services::{GameService, RevealOutcome};
use memomines::store::MemoryStore;
use memomines::{GameConfig, GameError};

/// Interactive console game against the in-memory store. Moves are typed
/// as memo strings, e.g. `A:1`, exactly as they would arrive on the wire.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memomines=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GameConfig::from_env()?;
    config.validate()?;

    let store = Arc::new(MemoryStore::new());
    let game = GameService::new(store, config);
    let round_id = game.reset_round().await?;

    println!("Round {round_id}. Enter moves as <COL>:<ROW> (e.g. A:1), 'reset', or 'quit'.");
    print_board(&game, round_id).await?;

    let stdin = io::stdin();
    let mut round_id = round_id;
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let memo = line.trim();
        if memo.is_empty() {
            continue;
        }
        if memo.eq_ignore_ascii_case("quit") {
            break;
        }
        if memo.eq_ignore_ascii_case("reset") {
            round_id = game.reset_round().await?;
            println!("Round {round_id}.");
            print_board(&game, round_id).await?;
            continue;
        }

        let event = MoveEvent {
            tx_hash: format!("local-{round_id}-{memo}"),
            owner: "console".to_string(),
            memo: memo.to_string(),
            signer: None,
        };
        match game.apply_move(&event).await {
            Ok(report) => {
                print_board(&game, round_id).await?;
                match report.outcome {
                    RevealOutcome::HitMine => println!("Boom. Round {round_id} lost."),
                    RevealOutcome::Won { .. } => println!("Cleared! Round {round_id} won."),
                    RevealOutcome::Revealed { opened } => println!("Opened {opened} cell(s)."),
                    RevealOutcome::OutOfBounds => println!("That cell is off the board."),
                    RevealOutcome::AlreadyRevealed => println!("Already revealed."),
                }
            }
            Err(GameError::InvalidMove(reason)) => println!("Invalid move: {reason}"),
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}

async fn print_board(game: &GameService, round_id: i64) -> anyhow::Result<()> {
    let view = game.board_view(round_id).await?;
    print!("{}", view.to_ascii());
    println!("Status: {}", view.status.as_str());
    Ok(())
}
