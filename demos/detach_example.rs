//! Create two detached threads, let the reaper reclaim them, then exit
//! without ever joining.

use std::time::Duration;

fn print_repeated(word: &'static str) {
    for _ in 0..10 {
        println!("{word}");
        std::thread::sleep(Duration::from_millis(10));
        uthreads::yield_now();
    }
}

fn main() {
    uthreads::init(uthreads::SchedPolicy::Fifo, uthreads::config::DEFAULT_STACK_SIZE)
        .expect("default policy is always implemented");

    let thread1 = uthreads::create(|| print_repeated("hello"), 0).expect("create thread1");
    uthreads::detach(thread1).expect("detach thread1");
    println!("Created thread1.");

    let thread2 = uthreads::create(|| print_repeated("world"), 0).expect("create thread2");
    uthreads::detach(thread2).expect("detach thread2");
    println!("Created thread2.");

    for _ in 0..25 {
        uthreads::yield_now();
    }
}
