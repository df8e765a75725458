//! The `spacedrep init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create spacedrep.toml
    if std::path::Path::new("spacedrep.toml").exists() {
        println!("spacedrep.toml already exists, skipping.");
    } else {
        std::fs::write("spacedrep.toml", SAMPLE_CONFIG)?;
        println!("Created spacedrep.toml");
    }

    // Create example deck
    std::fs::create_dir_all("decks")?;
    let example_path = std::path::Path::new("decks/example.toml");
    if example_path.exists() {
        println!("decks/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_DECK)?;
        println!("Created decks/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: spacedrep validate --deck decks/example.toml");
    println!("  2. Run: spacedrep import --user me --deck decks/example.toml");
    println!("  3. Run: spacedrep session --user me");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# spacedrep configuration

storage_timeout_ms = 5000

[store]
type = "json"
path = "./spacedrep-data.json"

[scheduling]
initial_ease = 2.5
min_ease = 1.3
pass_threshold = 3
first_interval_days = 1
second_interval_days = 6
lapse_interval_days = 1
max_interval_days = 36500

[session]
max_size = 20
new_card_ratio = 0.2

# Quality recorded for quiz answers.
[grading]
correct = 5
partial = 3
incorrect = 2
"#;

const EXAMPLE_DECK: &str = r#"[deck]
subject = "Biology"
name = "Cell biology basics"
source = "cell-biology.pdf"

[[cards]]
kind = "short_answer"
question = "Which organelle is known as the powerhouse of the cell?"
answer = "Mitochondria"
page = 3

[[cards]]
kind = "fill_in_blank"
question = "The ____ controls what enters and leaves the cell."
answer = "cell membrane"
page = 5

[[cards]]
kind = "multiple_choice"
question = "Where are proteins assembled?"
answer = "Ribosome"
options = ["Ribosome", "Lysosome", "Vacuole", "Nucleolus"]
page = 8

[[cards]]
question = "What does DNA stand for?"
answer = "Deoxyribonucleic acid"
"#;
