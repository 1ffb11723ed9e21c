use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use s2grid_picker::grid;
use s2grid_picker::{Config, Controller, Effect, ExportFormat, LatLng, Message, Millis, Viewport, export};

#[derive(Parser)]
#[command(name = "s2grid-picker", version, about = "Pick Sentinel-2 grid tiles, share them as a URL and export them")]
struct Args {
    /// Grid dataset: a GeoJSON file path or an http(s) URL
    #[arg(short, long)]
    grid: String,

    /// No-coverage overlay (GeoJSON path or URL); failures are ignored
    #[arg(long)]
    overlay: Option<String>,

    /// Share URL to restore the selection from; also the base for the printed URL
    #[arg(short, long, default_value = "")]
    url: String,

    /// Minimum zoom at which the grid is drawn (overrides S2GRID_MIN_ZOOM)
    #[arg(long)]
    min_zoom: Option<f64>,

    /// Maximum number of grids drawn per viewport (overrides S2GRID_MAX_FEATURES)
    #[arg(long)]
    max_features: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the grids drawn for a viewport
    Visible {
        #[arg(long, allow_hyphen_values = true)]
        north: f64,
        #[arg(long, allow_hyphen_values = true)]
        south: f64,
        #[arg(long, allow_hyphen_values = true)]
        east: f64,
        #[arg(long, allow_hyphen_values = true)]
        west: f64,
        #[arg(long)]
        zoom: f64,
    },
    /// Toggle the grids under a point and print the new share URL
    Pick {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    /// Select every grid touching a rectangle and print the new share URL
    Rect {
        #[arg(long, allow_hyphen_values = true)]
        from_lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        from_lon: f64,
        #[arg(long, allow_hyphen_values = true)]
        to_lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        to_lon: f64,
    },
    /// Find grids by name prefix
    Search {
        query: String,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Write the selection to a timestamped file
    Export {
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Geojson)]
        format: ExportFormat,
        /// Directory to write into
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Deselect one grid and print the new share URL
    Remove { name: String },
    /// Deselect everything and print the new share URL
    Clear,
}

/// Half-size, in degrees, of the viewport opened around a picked point.
const PICK_SPAN: f64 = 1.0;

struct Session {
    controller: Controller,
    started: Instant,
}

impl Session {
    fn now(&self) -> Millis {
        Millis(self.started.elapsed().as_millis() as u64)
    }

    fn send(&mut self, msg: Message) -> Vec<Effect> {
        let now = self.now();
        let fx = self.controller.handle(now, msg);
        for effect in &fx {
            match effect {
                Effect::DatasetError(text) => {
                    eprintln!("error: {text}");
                    std::process::exit(1);
                }
                Effect::Feedback(text) => eprintln!("{text}"),
                _ => {}
            }
        }
        fx
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = Config::from_env();
    if let Some(z) = args.min_zoom {
        config.min_zoom = z;
    }
    if let Some(n) = args.max_features {
        config.max_features = n;
    }

    let mut session = Session {
        controller: Controller::new(config, &args.url),
        started: Instant::now(),
    };
    session.send(Message::DatasetLoaded(grid::load_grid(&args.grid)));
    if let Some(source) = &args.overlay {
        session.send(Message::OverlayLoaded(grid::load_overlay(source)));
    }
    session.send(Message::MapReady);

    match args.command {
        Command::Visible {
            north,
            south,
            east,
            west,
            zoom,
        } => {
            session.send(Message::ViewportChanged(Viewport::new(north, south, east, west, zoom)));
            for feature in session.controller.rendered() {
                println!("{}", feature.name);
            }
        }
        Command::Pick { lat, lon } => {
            let zoom = session.controller.config().search_zoom.max(session.controller.config().min_zoom);
            session.send(Message::ViewportChanged(Viewport::new(
                lat + PICK_SPAN,
                lat - PICK_SPAN,
                lon + PICK_SPAN,
                lon - PICK_SPAN,
                zoom,
            )));
            let fx = session.send(Message::Click {
                point: LatLng::new(lat, lon),
            });
            if fx.is_empty() {
                eprintln!("No grid at {lat}, {lon}");
            }
            print_selection(&session.controller);
        }
        Command::Rect {
            from_lat,
            from_lon,
            to_lat,
            to_lon,
        } => {
            let from = LatLng::new(from_lat, from_lon);
            let to = LatLng::new(to_lat, to_lon);
            session.send(Message::PointerDown {
                point: from,
                shift: true,
                dragging_enabled: true,
            });
            session.send(Message::PointerMove { point: to });
            session.send(Message::PointerUp { point: to });
            print_selection(&session.controller);
        }
        Command::Search { query, limit } => {
            let Some(index) = session.controller.grid() else {
                std::process::exit(1);
            };
            let hits = index.search(&query, limit);
            if hits.is_empty() {
                eprintln!("No grid starts with \"{query}\"");
                std::process::exit(1);
            }
            for feature in hits {
                match feature.centroid() {
                    Some(c) => println!("{}\t{:.6}\t{:.6}", feature.name, c.lat, c.lng),
                    None => println!("{}", feature.name),
                }
            }
        }
        Command::Export { format, out } => {
            let fx = session.send(Message::Export {
                format,
                at: chrono::Utc::now(),
            });
            let Some(Effect::Download(download)) = fx.into_iter().find(|e| matches!(e, Effect::Download(_))) else {
                std::process::exit(1);
            };
            match export::write_download(&out, &download) {
                Ok(path) => println!("{}", path.display()),
                Err(err) => {
                    session.send(Message::DownloadFailed(err.to_string()));
                    std::process::exit(1);
                }
            }
        }
        Command::Remove { name } => {
            session.send(Message::Remove(name));
            print_selection(&session.controller);
        }
        Command::Clear => {
            session.send(Message::Clear);
            print_selection(&session.controller);
        }
    }
}

fn print_selection(controller: &Controller) {
    let names = controller.selection().sorted_names();
    if names.is_empty() {
        eprintln!("Selection is empty");
    } else {
        eprintln!("Selected: {}", names.join(", "));
    }
    println!("{}", controller.share_url());
}
