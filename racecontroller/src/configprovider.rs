use defmt::{debug, error, info, warn};
use embassy_rp::{
    flash::{self, Flash},
    peripherals::FLASH,
};
use embassy_time::{block_for, Duration};
use racecore::{config::STORED_CONFIG_SIZE, RaceConfig};

const FLASH_SIZE: usize = 2 * 1024 * 1024; // 2MiB

/// The config lives in the last flash sector.
const CONFIG_FLASH_LOCATION: u32 = (FLASH_SIZE - flash::ERASE_SIZE) as u32;

/// Load the persisted race config.
///
/// Falls back to the defaults if the sector is erased, corrupted or holds invalid values. The
/// defaults are then written back, so the sector always holds a valid record afterwards.
///
/// Runs before the second core is started, flash operations stall code execution from flash.
pub fn load_config(flash: FLASH) -> RaceConfig {
    // add some delay to give an attached debug probe time to parse the defmt RTT header. Reading
    // that header might touch flash memory, which interferes with flash write operations.
    block_for(Duration::from_millis(10));

    let mut flash = Flash::<_, FLASH_SIZE>::new(flash);
    if let Some(config) = load_from_flash(&mut flash) {
        info!("Successfully loaded config");
        return config;
    }

    let config = RaceConfig::new();
    save_to_flash(&config, &mut flash);
    config
}

fn load_from_flash<const SIZE: usize>(
    flash: &mut Flash<impl flash::Instance, SIZE>,
) -> Option<RaceConfig> {
    let mut buf = [0; STORED_CONFIG_SIZE];
    if flash.read(CONFIG_FLASH_LOCATION, &mut buf).is_err() {
        error!("Couldn't read from flash! Using default config");
        return None;
    }

    match RaceConfig::decode(&buf) {
        Ok(config) => {
            debug!("loaded {}", config);
            Some(config)
        }
        Err(e) => {
            warn!("Stored config unusable ({}), using default config", e);
            None
        }
    }
}

fn save_to_flash<const SIZE: usize>(
    config: &RaceConfig,
    flash: &mut Flash<impl flash::Instance, SIZE>,
) {
    let mut buf = [0xFF; STORED_CONFIG_SIZE];
    if let Err(e) = config.encode(&mut buf) {
        error!("unable to encode config: {}", e);
        return;
    }
    if flash
        .erase(
            CONFIG_FLASH_LOCATION,
            CONFIG_FLASH_LOCATION + flash::ERASE_SIZE as u32,
        )
        .is_err()
    {
        warn!("unable to erase flash");
    }
    if flash.write(CONFIG_FLASH_LOCATION, &buf).is_err() {
        error!("couldn't write config to flash!");
    } else {
        info!("wrote default config to flash");
    }
}
