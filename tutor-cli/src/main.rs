//! tutor-cli — teacher-side CLI for the tutor HTTP API
//!
//! # Subcommands
//! - `status`                                  — show server health
//! - `pending [--json]`                        — answers awaiting review
//! - `approve <id>`                            — accept the model grade
//! - `edit <id> --score <S> [--comment <C>]`   — replace the grade
//! - `semaphore [<identity>]`                  — traffic-light colors

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8780";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "tutor-cli", version, about = "Teacher CLI for the tutor service")]
struct Cli {
    /// Tutor HTTP server URL (overrides TUTOR_HTTP_URL env var)
    #[arg(long, env = "TUTOR_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show tutor server status
    Status,

    /// List answers awaiting teacher review
    Pending {
        /// Print the raw JSON array
        #[arg(long)]
        json: bool,
    },

    /// Approve the model grade of an answer
    Approve {
        /// Answer id
        id: String,
    },

    /// Replace the grade of an answer
    Edit {
        /// Answer id
        id: String,

        /// New score, 0–10
        #[arg(long)]
        score: f64,

        /// Feedback for the student
        #[arg(long)]
        comment: Option<String>,
    },

    /// Show the semaphore for every student, or for one
    Semaphore {
        identity: Option<String>,
    },
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PendingAnswer {
    pub id: String,
    pub identity: String,
    pub practice_id: String,
    pub problem_id: String,
    pub answer: String,
    pub llm_score: Option<f64>,
    pub llm_comment: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct PendingResponse {
    pub answers: Vec<PendingAnswer>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct StudentStatus {
    pub identity: String,
    pub color: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusesResponse {
    pub students: Vec<StudentStatus>,
    pub count: usize,
}

// ============================================================================
// Formatting
// ============================================================================

pub fn color_marker(color: &str) -> &'static str {
    match color {
        "green" => "●  green ",
        "yellow" => "▲  yellow",
        "red" => "■  red   ",
        _ => "?  unknown",
    }
}

/// One line per pending answer: id, student, exercise, grade, preview.
pub fn format_pending_row(answer: &PendingAnswer) -> String {
    let grade = match answer.llm_score {
        Some(score) => format!("{:>4.1}", score),
        None => " -- ".to_string(),
    };
    let preview: String = answer
        .answer
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .chars()
        .take(40)
        .collect();

    format!(
        "{}  {:<12} {}/{}  {}  {}",
        answer.id, answer.identity, answer.practice_id, answer.problem_id, grade, preview
    )
}

pub fn format_status_row(status: &StudentStatus) -> String {
    match &status.updated_at {
        Some(at) => format!("{}  {:<20} {}", color_marker(&status.color), status.identity, at),
        None => format!("{}  {}", color_marker(&status.color), status.identity),
    }
}

pub fn review_body(approve: bool, score: Option<f64>, comment: Option<&str>) -> serde_json::Value {
    if approve {
        serde_json::json!({ "action": "approve" })
    } else {
        serde_json::json!({
            "action": "edit",
            "score": score,
            "comment": comment,
        })
    }
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client() -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?)
}

/// GET a JSON document, exiting with a message on transport or HTTP errors.
fn get_json(url: &str) -> anyhow::Result<serde_json::Value> {
    let resp = match client()?.get(url).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("tutor-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        eprintln!("tutor-cli: server returned {}: {}", status, body);
        std::process::exit(1);
    }

    Ok(resp.json()?)
}

fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);
    let resp = client()?.get(&url).send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Tutor server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:      {}", body["version"].as_str().unwrap_or("?"));
            println!("Storage:      {}", body["storage"].as_str().unwrap_or("?"));
            if let Some(pg) = body["postgresql"].as_str() {
                println!("PostgreSQL:   {}", pg);
            }
            println!("Subscribers:  {}", body["subscribers"].as_u64().unwrap_or(0));
        }
        Ok(r) => {
            eprintln!("tutor-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("tutor-cli: cannot reach {} — {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn do_pending(server: &str, json_output: bool) -> anyhow::Result<()> {
    let body = get_json(&format!("{}/answers/pending", server))?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&body["answers"])?);
        return Ok(());
    }

    let pending: PendingResponse = serde_json::from_value(body)?;
    if pending.count == 0 {
        eprintln!("No answers awaiting review");
        return Ok(());
    }

    for answer in &pending.answers {
        println!("{}", format_pending_row(answer));
        if let Some(comment) = &answer.llm_comment {
            println!("    {}", comment);
        }
    }
    println!("\n{} pending", pending.count);

    Ok(())
}

fn do_review(server: &str, id: &str, body: serde_json::Value) -> anyhow::Result<()> {
    let url = format!("{}/answers/{}/review", server, id);
    let resp = match client()?.post(&url).json(&body).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("tutor-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let body: serde_json::Value = resp.json().unwrap_or_default();

    if !status.is_success() {
        eprintln!(
            "tutor-cli: review rejected ({}): {}",
            status,
            body["error"].as_str().unwrap_or("unknown error")
        );
        std::process::exit(1);
    }

    let answer = &body["answer"];
    println!(
        "Answer {} {} with score {}",
        id,
        answer["status"].as_str().unwrap_or("reviewed"),
        answer["teacher_score"]
    );
    Ok(())
}

fn do_semaphore(server: &str, identity: Option<&str>) -> anyhow::Result<()> {
    match identity {
        Some(identity) => {
            let body = get_json(&format!("{}/students/{}/status", server, identity))?;
            let status: StudentStatus = serde_json::from_value(body)?;
            println!("{}", format_status_row(&status));
        }
        None => {
            let body = get_json(&format!("{}/students/status", server))?;
            let statuses: StatusesResponse = serde_json::from_value(body)?;
            if statuses.count == 0 {
                eprintln!("No student activity yet");
                return Ok(());
            }
            for status in &statuses.students {
                println!("{}", format_status_row(status));
            }
        }
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Status => do_status(&server),
        Commands::Pending { json } => do_pending(&server, json),
        Commands::Approve { id } => do_review(&server, &id, review_body(true, None, None)),
        Commands::Edit { id, score, comment } => {
            do_review(&server, &id, review_body(false, Some(score), comment.as_deref()))
        }
        Commands::Semaphore { identity } => do_semaphore(&server, identity.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("tutor-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(answer: &str, score: Option<f64>) -> PendingAnswer {
        PendingAnswer {
            id: "7b5c24ab-1234-5678-9abc-def012345678".to_string(),
            identity: "s1".to_string(),
            practice_id: "basics".to_string(),
            problem_id: "inc".to_string(),
            answer: answer.to_string(),
            llm_score: score,
            llm_comment: None,
            created_at: "2026-10-19T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_pending_row_shows_grade_and_first_line() {
        let row = format_pending_row(&pending("\ndef f(n):\n    return n + 1", Some(9.5)));
        assert!(row.starts_with("7b5c24ab-1234-5678-9abc-def012345678"));
        assert!(row.contains("basics/inc"));
        assert!(row.contains(" 9.5"));
        assert!(row.ends_with("def f(n):"));
    }

    #[test]
    fn test_pending_row_ungraded() {
        let row = format_pending_row(&pending("x", None));
        assert!(row.contains(" -- "));
    }

    #[test]
    fn test_pending_row_truncates_preview() {
        let row = format_pending_row(&pending(&"y".repeat(100), Some(1.0)));
        assert!(row.ends_with(&"y".repeat(40)));
        assert!(!row.contains(&"y".repeat(41)));
    }

    #[test]
    fn test_color_markers() {
        assert!(color_marker("green").contains("green"));
        assert!(color_marker("red").contains("red"));
        assert!(color_marker("purple").contains("unknown"));
    }

    #[test]
    fn test_status_row_with_and_without_timestamp() {
        let with = StudentStatus {
            identity: "s1".to_string(),
            color: "yellow".to_string(),
            updated_at: Some("2026-10-19T10:00:00Z".to_string()),
        };
        assert!(format_status_row(&with).contains("2026-10-19T10:00:00Z"));

        let without = StudentStatus {
            identity: "s2".to_string(),
            color: "green".to_string(),
            updated_at: None,
        };
        assert!(format_status_row(&without).ends_with("s2"));
    }

    #[test]
    fn test_review_bodies_match_server_actions() {
        assert_eq!(review_body(true, None, None), serde_json::json!({ "action": "approve" }));

        let edit = review_body(false, Some(6.5), Some("check the edge case"));
        assert_eq!(edit["action"], "edit");
        assert_eq!(edit["score"], 6.5);
        assert_eq!(edit["comment"], "check the edge case");

        let no_comment = review_body(false, Some(3.0), None);
        assert!(no_comment["comment"].is_null());
    }

    #[test]
    fn test_pending_response_parses_server_shape() {
        let body = serde_json::json!({
            "count": 1,
            "answers": [{
                "id": "7b5c24ab-1234-5678-9abc-def012345678",
                "identity": "s1",
                "practice_id": "basics",
                "problem_id": "inc",
                "answer": "n + 1",
                "llm_score": 8.0,
                "llm_comment": "good",
                "teacher_score": null,
                "teacher_comment": null,
                "status": "pending",
                "created_at": "2026-10-19T10:00:00Z",
                "graded_at": "2026-10-19T10:00:05Z",
                "reviewed_at": null
            }]
        });
        let parsed: PendingResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.count, 1);
        assert_eq!(parsed.answers[0].llm_score, Some(8.0));
    }
}
