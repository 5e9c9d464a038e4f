use client_core::{
    detail::Availability,
    geocode::MapLabel,
    listing::{PageWindow, SortCriterion},
    ImportReport,
};
use serde_json::Value;
use shared::domain::{Book, Coordinates, Library};

pub fn caption(window: Option<PageWindow>, page: usize, pages: usize) {
    match window {
        Some(window) => println!("-- {window} (page {page}/{pages})"),
        None => println!("-- nothing to show"),
    }
}

pub fn book_line(book: &Book) {
    let mut line = format!("#{:<5} {} | {}", book.id, book.name, book.author);
    if let Some(publisher) = &book.publisher {
        line.push_str(&format!(" | {publisher}"));
    }
    if let Some(quantity) = book.quantity_in_library {
        line.push_str(&format!(" | {quantity} in library"));
    }
    println!("{line}");
}

pub fn library_line(library: &Library) {
    let status = if library.is_active { "open" } else { "closed" };
    println!(
        "#{:<5} {} | {} | {} books | {status}",
        library.id,
        library.name,
        library.address.as_deref().unwrap_or("-"),
        library.total_books,
    );
}

pub fn sort_note(sort: Option<SortCriterion>) {
    if let Some(sort) = sort {
        println!("-- sorted by {sort}");
    }
}

pub fn book_detail(book: &Book, availability: Availability) {
    println!("{}", book.name);
    println!("  author:    {}", book.author);
    if let Some(publisher) = &book.publisher {
        println!("  publisher: {publisher}");
    }
    let availability = match availability {
        Availability::InStock(quantity) => format!("{quantity} available"),
        Availability::OutOfStock => "out of stock".to_string(),
        Availability::Unknown => "unknown".to_string(),
    };
    println!("  status:    {availability}");
}

pub fn library_detail(library: &Library) {
    println!("{}", library.name);
    println!("  address: {}", library.address.as_deref().unwrap_or("-"));
    if let Some(phone) = &library.phone {
        println!("  phone:   {phone}");
    }
    if let Some(email) = &library.email {
        println!("  email:   {email}");
    }
    println!(
        "  {} books, {}",
        library.total_books,
        if library.is_active { "open" } else { "closed" }
    );
}

pub fn profile(user: &Value) {
    match serde_json::to_string_pretty(user) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{user}"),
    }
}

pub fn import_report(report: &ImportReport) {
    println!("imported {} book(s)", report.submitted);
    if !report.skipped.is_empty() {
        let rows: Vec<String> = report.skipped.iter().map(ToString::to_string).collect();
        println!("skipped rows without name or author: {}", rows.join(", "));
    }
}

pub fn map(center: Coordinates, marker: Option<Coordinates>, label: &MapLabel) {
    println!("centre: {center}");
    if let Some(marker) = marker {
        println!("marker: {marker}");
    }
    println!("label:  {label}");
}
