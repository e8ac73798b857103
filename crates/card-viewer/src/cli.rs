use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Browse, render and create AI-generated encyclopedia cards.
#[derive(Parser, Debug)]
#[command(name = "card-viewer", version, about, long_about = None)]
pub struct Cli {
    /// Backend base URL, overriding `CARDS_API_URL`.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List cards, optionally filtered by title.
    List {
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Show one card.
    Show {
        id: String,

        /// Print the full HTML page instead of text.
        #[arg(long)]
        html: bool,
    },

    /// Render a local markdown file (`-` reads stdin).
    Render {
        #[arg(value_name = "PATH")]
        path: String,

        #[arg(long)]
        html: bool,
    },

    /// Request generation of a new card.
    Create {
        #[arg(long)]
        title: String,

        #[arg(long)]
        system_prompt: String,

        /// Topics the generated article should cover.
        #[arg(long)]
        topics: String,

        /// Optional PDF (at most 5MB) used as generation context.
        #[arg(long, value_name = "PDF")]
        context_file: Option<PathBuf>,
    },

    /// Search as you type: one query per stdin line, debounced.
    Search,

    /// Ask a question about a card.
    Ask { id: String, question: String },

    /// Rate how neutral a card's text is.
    Bias { id: String },
}
