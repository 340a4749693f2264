//! Interactive review of detected subscription candidates.

use std::io::{self, Write};

use anyhow::{Context, Result};

use abacus_core::{
    CandidateReview, CommitOutcome, ConfidenceBand, DetectedSubscriptionCandidate,
    TransactionStore,
};

use crate::format_cents;

pub fn print_candidate(number: usize, candidate: &DetectedSubscriptionCandidate, selected: bool) {
    let marker = if selected { "[x]" } else { "[ ]" };
    let band = ConfidenceBand::from_score(candidate.confidence);
    println!(
        "{marker} {number}. {} — {} {} ({} confidence {:.2}, {} payments)",
        candidate.name,
        format_cents(candidate.price),
        candidate.billing_cycle.label(),
        band.label(),
        candidate.confidence,
        candidate.transaction_ids.len(),
    );
    if let Some(domain) = &candidate.domain {
        println!("       {domain}");
    }
    if let Some(reasoning) = &candidate.reasoning {
        println!("       {reasoning}");
    }
}

/// Drive one review session over stdin and commit the accepted candidates.
pub async fn run_review<S: TransactionStore>(
    store: &S,
    candidates: Vec<DetectedSubscriptionCandidate>,
) -> Result<()> {
    let mut review = CandidateReview::new(candidates);
    print_selection(&review);

    loop {
        print!(
            "\nToggle 1-{}, (a)ll, (n)one, (c)onfirm, (q)uit: ",
            review.candidates().len()
        );
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let choice = input.trim();

        match choice {
            "c" => break,
            "q" => {
                review.cancel()?;
                println!("Cancelled — nothing was saved.");
                return Ok(());
            }
            "a" => {
                set_all(&mut review, true)?;
                print_selection(&review);
            }
            "n" => {
                set_all(&mut review, false)?;
                print_selection(&review);
            }
            _ => match choice.parse::<usize>() {
                Ok(number) if number >= 1 && number <= review.candidates().len() => {
                    review.toggle(number - 1)?;
                    print_selection(&review);
                }
                _ => println!("Invalid choice."),
            },
        }
    }

    review.begin_confirm()?;
    match review
        .commit(store)
        .await
        .context("failed to add subscriptions")?
    {
        CommitOutcome::Nothing => println!("Nothing selected — no subscriptions added."),
        CommitOutcome::Committed(subscriptions) => {
            println!("Added {} subscriptions:", subscriptions.len());
            for subscription in &subscriptions {
                println!(
                    "  #{} {} — {} {}",
                    subscription.id,
                    subscription.name,
                    format_cents(subscription.price),
                    subscription.billing_cycle.label(),
                );
            }
        }
    }
    Ok(())
}

/// Selection is toggle-only in the review machine; all/none are convenience
/// loops over it.
fn set_all(review: &mut CandidateReview, selected: bool) -> Result<()> {
    for index in 0..review.candidates().len() {
        if review.is_selected(index) != selected {
            review.toggle(index)?;
        }
    }
    Ok(())
}

fn print_selection(review: &CandidateReview) {
    println!();
    for (index, candidate) in review.candidates().iter().enumerate() {
        print_candidate(index + 1, candidate, review.is_selected(index));
    }
}
