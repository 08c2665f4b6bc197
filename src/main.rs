use std::sync::Arc;

use quarry::buffer::BufferPoolManager;
use quarry::recovery::LogManager;
use quarry::storage::disk::DiskManager;

fn main() {
    tracing_subscriber::fmt::init();

    println!("Quarry - a page-caching storage engine core");
    println!("===========================================\n");

    let db_path = "demo.db";

    let disk_manager = Arc::new(DiskManager::new(db_path).expect("failed to open database file"));
    println!("Opened database file: {}", db_path);

    let log_manager = Arc::new(LogManager::new());
    let bpm = BufferPoolManager::new(10, 2, Arc::clone(&disk_manager), Some(log_manager));
    println!("Created buffer pool with 10 frames (LRU-2 replacement)\n");

    // Allocate a page and fill in some bytes.
    let (page_id, frame) = bpm
        .new_page()
        .expect("disk fault")
        .expect("no frame available");
    println!("Allocated new page: {}", page_id);

    let message = b"Hello from the buffer pool!";
    frame.data_mut()[..message.len()].copy_from_slice(message);
    bpm.unpin_page(page_id, true);

    bpm.flush_page(page_id).expect("disk fault");
    println!("Wrote and flushed {} bytes", message.len());

    // Read the page back through a guard.
    {
        let guard = bpm
            .checked_read_page(page_id)
            .expect("disk fault")
            .expect("no frame available");
        println!(
            "Read back from {}: {:?}",
            page_id,
            String::from_utf8_lossy(&guard.data()[..message.len()])
        );
    }

    println!("\nDisk stats:");
    println!("  - pages written: {}", disk_manager.num_writes());
    println!("  - pages read:    {}", disk_manager.num_reads());

    bpm.delete_page(page_id);
    println!("\nDeleted {}; free frames: {}", page_id, bpm.free_frame_count());

    std::fs::remove_file(db_path).ok();
    println!("Demo completed successfully!");
}
