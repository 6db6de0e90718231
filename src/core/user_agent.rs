use rand::{Rng, seq::IndexedRandom};

const PLATFORMS: [&str; 5] = [
    "Windows NT 10.0; Win64; x64",
    "Windows NT 11.0; Win64; x64",
    "Macintosh; Intel Mac OS X 10_15_7",
    "X11; Linux x86_64",
    "X11; Ubuntu; Linux x86_64",
];

#[derive(Clone, Copy)]
enum Browser {
    Chrome,
    Firefox,
    Edge,
}

const BROWSERS: [Browser; 3] = [Browser::Chrome, Browser::Firefox, Browser::Edge];

pub fn random_user_agent() -> String {
    let mut rng = rand::rng();
    let platform = PLATFORMS.choose(&mut rng).copied().unwrap_or(PLATFORMS[0]);
    let browser = BROWSERS.choose(&mut rng).copied().unwrap_or(Browser::Chrome);

    match browser {
        Browser::Chrome => {
            let major = rng.random_range(118..=136);
            format!(
                "Mozilla/5.0 ({platform}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{major}.0.0.0 Safari/537.36"
            )
        }
        Browser::Firefox => {
            let major = rng.random_range(115..=137);
            format!("Mozilla/5.0 ({platform}; rv:{major}.0) Gecko/20100101 Firefox/{major}.0")
        }
        Browser::Edge => {
            let major = rng.random_range(118..=136);
            format!(
                "Mozilla/5.0 ({platform}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{major}.0.0.0 Safari/537.36 Edg/{major}.0.0.0"
            )
        }
    }
}
