// src/admin_cli.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::app_log;
use crate::core::models::{JobStatus, Role};
use crate::core::repositories::{JobRepository, NewJob, UserRepository};
use crate::core::{Database, MatchService};
use crate::pagination::{PageParams, MAX_PER_PAGE};
use crate::web::validation::{normalize_skills, require_text, validate_range, MAX_DESCRIPTION_LEN, MAX_TITLE_LEN};

#[derive(Parser)]
#[command(name = "moltin-admin")]
#[command(about = "Administer the MoltIn database")]
pub struct AdminCli {
    #[command(subcommand)]
    pub command: AdminCommand,

    #[arg(long, default_value = "data/moltin.db")]
    pub database_path: PathBuf,
}

#[derive(Subcommand)]
pub enum AdminCommand {
    /// Create the database and run migrations
    Init,
    /// List users, optionally filtered by role
    Users {
        #[arg(long)]
        role: Option<Role>,
    },
    /// Change a user's role
    SetRole { user_id: i64, role: Role },
    /// Close an open job
    CloseJob { job_id: i64 },
    /// Import jobs from a CSV file on behalf of a poster
    ImportJobs {
        csv_file: PathBuf,
        #[arg(long)]
        poster: i64,
    },
    /// Recompute stored match scores of pending applications
    Rescore {
        #[arg(long)]
        job: Option<i64>,
    },
}

/// One CSV row. `skills` is a `;`-separated list.
#[derive(Debug, Deserialize)]
struct JobCsvRow {
    title: String,
    description: String,
    #[serde(default)]
    skills: String,
    budget_min: Option<f64>,
    budget_max: Option<f64>,
    location: Option<String>,
    #[serde(default)]
    remote: bool,
}

impl JobCsvRow {
    fn into_new_job(self) -> Result<NewJob> {
        validate_range(self.budget_min, self.budget_max, "Budget")?;
        let skills = self.skills.split(';').map(str::to_string).collect();

        Ok(NewJob {
            title: require_text(&self.title, "Title", MAX_TITLE_LEN)?,
            description: require_text(&self.description, "Description", MAX_DESCRIPTION_LEN)?,
            skills: normalize_skills(skills)?,
            budget_min: self.budget_min,
            budget_max: self.budget_max,
            location: self.location.filter(|l| !l.trim().is_empty()),
            remote: self.remote,
        })
    }
}

fn read_job_rows(csv_file: &Path) -> Result<Vec<Result<NewJob>>> {
    let mut reader = csv::Reader::from_path(csv_file)
        .with_context(|| format!("Failed to open {}", csv_file.display()))?;

    Ok(reader
        .deserialize::<JobCsvRow>()
        .map(|row| row.map_err(anyhow::Error::from).and_then(JobCsvRow::into_new_job))
        .collect())
}

pub async fn handle_admin_command(cli: AdminCli) -> Result<()> {
    let database = Database::new(&cli.database_path).await?;
    let pool = database.pool();

    match cli.command {
        AdminCommand::Init => {
            app_log!(info, "✅ Database initialized at: {}", cli.database_path.display());
            app_log!(
                info,
                "   Tables: users, agents, profiles, jobs, applications, messages, follows"
            );
        }

        AdminCommand::Users { role } => {
            let users = UserRepository::new(pool);
            let mut page = 1;
            loop {
                let params = PageParams::new(page, MAX_PER_PAGE);
                let (batch, total) = users.list(role, &params).await?;
                if page == 1 {
                    app_log!(info, "{} users", total);
                }
                for user in &batch {
                    app_log!(
                        info,
                        "  #{:<5} {:<10} {:<9} {}",
                        user.id,
                        user.role,
                        format!("{:?}", user.auth_provider).to_lowercase(),
                        user.display_name
                    );
                }
                if batch.len() < MAX_PER_PAGE as usize {
                    break;
                }
                page += 1;
            }
        }

        AdminCommand::SetRole { user_id, role } => {
            if UserRepository::new(pool).set_role(user_id, role).await? {
                app_log!(info, "✅ User {} is now {}", user_id, role);
            } else {
                app_log!(info, "❌ User {} not found", user_id);
            }
        }

        AdminCommand::CloseJob { job_id } => {
            if JobRepository::new(pool)
                .set_status(job_id, JobStatus::Closed)
                .await?
            {
                app_log!(info, "✅ Job {} closed", job_id);
            } else {
                app_log!(info, "❌ Job {} not found", job_id);
            }
        }

        AdminCommand::ImportJobs { csv_file, poster } => {
            if !UserRepository::new(pool).exists(poster).await? {
                app_log!(info, "❌ Poster {} not found", poster);
                return Ok(());
            }

            let jobs = JobRepository::new(pool);
            let mut success_count = 0;
            let mut error_count = 0;

            for (line, row) in read_job_rows(&csv_file)?.into_iter().enumerate() {
                match row {
                    Ok(new_job) => match jobs.create(poster, &new_job).await {
                        Ok(job) => {
                            success_count += 1;
                            app_log!(info, "✅ Added job {}: {}", job.id, job.title);
                        }
                        Err(e) => {
                            error_count += 1;
                            app_log!(info, "❌ Failed to add row {}: {}", line + 1, e);
                        }
                    },
                    Err(e) => {
                        error_count += 1;
                        app_log!(info, "⚠️  Skipping row {}: {}", line + 1, e);
                    }
                }
            }

            app_log!(info, "Import completed:");
            app_log!(info, "  ✅ Success: {}", success_count);
            app_log!(info, "  ❌ Errors:  {}", error_count);
        }

        AdminCommand::Rescore { job } => {
            let changed = MatchService::new(pool).rescore_pending(job).await?;
            app_log!(info, "✅ {} application scores updated", changed);
        }
    }

    Ok(())
}
