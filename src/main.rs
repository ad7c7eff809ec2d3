fn main() {
    blueprint::cli::run();
}
