//! Database statistics display.

use owo_colors::OwoColorize;
use repo_harvest::Result;
use repo_harvest::store::Store;
use std::path::Path;

const TOP_LANGUAGE_COUNT: usize = 10;

/// Print aggregate statistics for an existing harvest database.
pub fn show_stats(store: &dyn Store, db: &Path) -> Result<()> {
    let counts = store.counts()?;
    let languages = store.top_languages(TOP_LANGUAGE_COUNT)?;

    println!("{} ({})", "Harvest statistics".green().bold(), db.display());
    println!("  repositories:        {}", counts.total);
    println!("  basic completed:     {}", counts.basic_completed);
    println!("  detail completed:    {}", counts.detail_completed);
    println!("  non-forks:           {}", counts.non_forks);
    println!("  average stars:       {:.1}", counts.avg_stars);
    println!("  max stars:           {}", counts.max_stars);
    println!("  distinct languages:  {}", counts.distinct_languages);
    println!("  distinct owners:     {}", counts.distinct_owners);
    println!("  files recorded:      {}", counts.found_files);
    println!("  secret-like files:   {}", counts.secret_files);

    if !languages.is_empty() {
        println!("  top languages:");
        for (rank, (language, count)) in languages.iter().enumerate() {
            println!("    {:>2}. {language:<16} {count}", rank + 1);
        }
    }

    Ok(())
}
