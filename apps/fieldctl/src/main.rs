use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use client_core::{load_settings, FieldClient, FileUpload, StaticCredentials};
use serde::Serialize;
use shared::{
    domain::{FieldId, ImageId, SeasonId, UavFlightId, UserId},
    geometry::{self, Polygon},
    protocol::{FieldSeasonImagesRequest, NewField, NewSeason, NewUavFlight, StartAnalysisRequest},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Inspect and edit fields, seasons and UAV flights")]
struct Cli {
    /// Overrides the configured API base URL.
    #[arg(long, env = "FIELD_API_URL")]
    api_url: Option<String>,
    #[arg(long, env = "FIELD_API_TOKEN")]
    token: Option<String>,
    /// Owner whose records list commands show.
    #[arg(long, env = "FIELD_OWNER_ID")]
    owner: Option<i64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Fields {
        #[arg(long)]
        page: Option<usize>,
        #[arg(long, default_value_t = 20)]
        per_page: usize,
    },
    AddField {
        #[arg(long)]
        name: String,
        /// Boundary as WKT in `lon lat` order.
        #[arg(long)]
        wkt: String,
        #[arg(long)]
        description: Option<String>,
    },
    DeleteField {
        field_id: i64,
    },
    Seasons,
    AddSeason {
        #[arg(long)]
        name: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long)]
        description: Option<String>,
    },
    DeleteSeason {
        season_id: i64,
    },
    /// Flights of the owner, or of one field within one season.
    Flights {
        #[arg(long, requires = "season")]
        field: Option<i64>,
        #[arg(long, requires = "field")]
        season: Option<i64>,
    },
    AddFlight {
        #[arg(long)]
        description: Option<String>,
        /// Image file to upload with the flight; repeatable.
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },
    /// Attaches image files to a field within a season.
    AddImages {
        #[arg(long)]
        season: i64,
        #[arg(long)]
        field: i64,
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    Analyze {
        uav_flight_id: i64,
        #[arg(long)]
        image: Option<i64>,
    },
    /// Decodes a WKT polygon locally and prints its map points.
    DecodeWkt {
        wkt: String,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn owner(cli_owner: Option<i64>) -> Result<UserId> {
    cli_owner
        .map(UserId)
        .context("--owner (or FIELD_OWNER_ID) is required for this command")
}

async fn read_images(paths: &[PathBuf]) -> Result<Vec<FileUpload>> {
    let mut uploads = Vec::with_capacity(paths.len());
    for path in paths {
        uploads.push(FileUpload::read("images", path).await?);
    }
    Ok(uploads)
}

/// Drops the closing repeat; the server closes rings itself.
fn open_ring(polygon: Polygon) -> Result<Polygon> {
    if !polygon.is_closed() {
        return Ok(polygon);
    }
    let mut points = polygon.into_points();
    points.pop();
    Polygon::new(points).context("boundary has too few points once the ring is opened")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    if let Command::DecodeWkt { wkt } = &cli.command {
        let polygon = geometry::decode(wkt).context("failed to decode WKT")?;
        return print_json(&polygon);
    }

    let mut settings = load_settings()?;
    if let Some(url) = cli.api_url {
        settings.api_base_url = client_core::config::normalize_base_url(&url)?;
    }
    info!(api = %settings.api_base_url, "using field API");
    let client = FieldClient::connect(&settings, Arc::new(StaticCredentials(cli.token)))?;

    match cli.command {
        Command::Fields { page, per_page } => {
            let owner = owner(cli.owner)?;
            match page {
                Some(page) => print_json(&client.list_fields_page(owner, page, per_page).await?)?,
                None => print_json(&client.list_fields(owner).await?)?,
            }
        }
        Command::AddField {
            name,
            wkt,
            description,
        } => {
            let boundary = open_ring(geometry::decode(&wkt).context("failed to decode WKT")?)?;
            let outcome = client
                .create_field(NewField {
                    name,
                    boundary,
                    description,
                })
                .await?;
            print_json(&outcome.response)?;
        }
        Command::DeleteField { field_id } => {
            let outcome = client.delete_field(FieldId(field_id)).await?;
            info!(field_id, status = outcome.status, "field deleted");
        }
        Command::Seasons => {
            print_json(&client.list_seasons(owner(cli.owner)?).await?)?;
        }
        Command::AddSeason {
            name,
            start,
            end,
            description,
        } => {
            let outcome = client
                .create_season(NewSeason {
                    name,
                    start_date: start,
                    end_date: end,
                    description,
                })
                .await?;
            print_json(&outcome.response)?;
        }
        Command::DeleteSeason { season_id } => {
            let outcome = client.delete_season(SeasonId(season_id)).await?;
            info!(season_id, status = outcome.status, "season deleted");
        }
        Command::Flights { field, season } => match (field, season) {
            (Some(field), Some(season)) => print_json(
                &client
                    .uav_flights_for_field_season(FieldId(field), SeasonId(season))
                    .await?,
            )?,
            _ => print_json(&client.uav_flights_by_owner(owner(cli.owner)?).await?)?,
        },
        Command::AddFlight {
            description,
            images,
        } => {
            let images = read_images(&images).await?;
            let outcome = client
                .create_uav_flight(
                    NewUavFlight {
                        flight_date: Utc::now(),
                        description,
                    },
                    images,
                )
                .await?;
            print_json(&outcome.response)?;
        }
        Command::AddImages {
            season,
            field,
            images,
        } => {
            let images = read_images(&images).await?;
            let outcome = client
                .add_images_to_field_season(
                    FieldSeasonImagesRequest {
                        season_id: SeasonId(season),
                        field_id: FieldId(field),
                    },
                    images,
                )
                .await?;
            print_json(&outcome.response)?;
        }
        Command::Analyze {
            uav_flight_id,
            image,
        } => {
            let outcome = client
                .start_analysis(StartAnalysisRequest {
                    uav_flight_id: UavFlightId(uav_flight_id),
                    image_id: image.map(ImageId),
                })
                .await?;
            print_json(&outcome.response)?;
        }
        Command::DecodeWkt { .. } => {}
    }
    Ok(())
}
