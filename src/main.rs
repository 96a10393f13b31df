use clap::Parser;

use audiopipe::checkpoint::{load_transcript, write_json_atomic};
use audiopipe::cli::{Cli, Command};
use audiopipe::merge::consolidate_utterances;
use audiopipe::model::TranscriptDocument;
use audiopipe::progress::TracingSink;
use audiopipe::{Pipeline, PipeResult};

fn main() {
    audiopipe::logging::init();

    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run() -> PipeResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            let config = args.to_config();
            let pipeline = Pipeline::new(config, &TracingSink)?;
            let summary = pipeline.run()?;

            println!(
                "Pipeline complete in {:.1}s",
                summary.elapsed.as_secs_f64()
            );
            println!("Output saved to: {}", summary.transcript_path.display());
            println!(
                "Consolidated output saved to: {}",
                summary.consolidated_path.display()
            );
            println!(
                "Found {} speaker(s): {}",
                summary.speakers.len(),
                summary.speakers.join(", ")
            );
            println!(
                "Transcribed {} segment(s) ({} consolidated utterance(s))",
                summary.segment_count, summary.utterance_count
            );
            println!("Total duration: {:.1}s", summary.total_duration);
            Ok(())
        }
        Command::Consolidate(args) => {
            let transcript = load_transcript(&args.input)?;
            let consolidated = TranscriptDocument {
                segments: consolidate_utterances(&transcript.segments, args.max_gap),
            };
            let output = args.output_path();
            write_json_atomic(&output, &consolidated)?;

            println!(
                "Consolidated {} segment(s) into {} utterance(s)",
                transcript.segments.len(),
                consolidated.segments.len()
            );
            println!("Output saved to: {}", output.display());
            Ok(())
        }
    }
}
