mod common;

mod read {
    use crate::common;
    use crate::common::FLASH_SECTOR_SIZE;
    use nor_nvs::Nvs;
    use nor_nvs::error::Error;
    use pretty_assertions::assert_eq;

    #[test]
    fn history() {
        let mut flash = common::Flash::new(2);
        let nvs = Nvs::new(0, FLASH_SECTOR_SIZE, 2, &mut flash).unwrap();

        nvs.write(1, b"v0").unwrap();
        nvs.write(1, b"v1").unwrap();
        nvs.write(2, b"other").unwrap();
        nvs.write(1, b"v2").unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(nvs.read_hist(1, &mut buf, 0), Ok(2));
        assert_eq!(&buf[..2], b"v2");
        assert_eq!(nvs.read_hist(1, &mut buf, 1), Ok(2));
        assert_eq!(&buf[..2], b"v1");
        assert_eq!(nvs.read_hist(1, &mut buf, 2), Ok(2));
        assert_eq!(&buf[..2], b"v0");
        assert_eq!(nvs.read_hist(1, &mut buf, 3), Err(Error::NotFound));

        assert_eq!(nvs.read_hist(2, &mut buf, 0), Ok(5));
        assert_eq!(nvs.read_hist(2, &mut buf, 1), Err(Error::NotFound));
    }

    #[test]
    fn history_across_a_delete() {
        let mut flash = common::Flash::new(2);
        let nvs = Nvs::new(0, FLASH_SECTOR_SIZE, 2, &mut flash).unwrap();

        nvs.write(1, b"old").unwrap();
        nvs.delete(1).unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(nvs.read(1, &mut buf), Err(Error::NotFound));
        // the tombstone counts as a version
        assert_eq!(nvs.read_hist(1, &mut buf, 1), Ok(3));
        assert_eq!(&buf[..3], b"old");
    }

    #[test]
    fn truncated_read() {
        let mut flash = common::Flash::new(2);
        let nvs = Nvs::new(0, FLASH_SECTOR_SIZE, 2, &mut flash).unwrap();

        nvs.write(1, b"0123456789").unwrap();

        let mut buf = [0xEEu8; 6];
        assert_eq!(nvs.read(1, &mut buf[..3]), Ok(10));
        assert_eq!(buf, *b"012\xEE\xEE\xEE");

        assert_eq!(nvs.read(1, &mut []), Ok(10));
    }

    #[test]
    fn values_survive_remount() {
        let mut flash = common::Flash::new(3);

        let nvs = Nvs::new(0, FLASH_SECTOR_SIZE, 3, &mut flash).unwrap();
        for id in 0..20u16 {
            nvs.write(id, &id.to_le_bytes().repeat(10)).unwrap();
        }
        drop(nvs);

        let nvs = Nvs::new(0, FLASH_SECTOR_SIZE, 3, &mut flash).unwrap();
        let mut buf = [0u8; 20];
        for id in 0..20u16 {
            assert_eq!(nvs.read(id, &mut buf), Ok(20));
            assert_eq!(buf.to_vec(), id.to_le_bytes().repeat(10));
        }
    }

    #[test]
    fn partition_at_an_offset() {
        let mut flash = common::Flash::new(4);

        let nvs = Nvs::new(2 * FLASH_SECTOR_SIZE, FLASH_SECTOR_SIZE, 2, &mut flash).unwrap();
        nvs.write(1, b"moved").unwrap();
        drop(nvs);

        assert!(flash.is_sector_erased(0));
        assert!(flash.is_sector_erased(1));
        assert_eq!(flash.bytes(2, 0, 5), b"moved");

        let nvs = Nvs::new(2 * FLASH_SECTOR_SIZE, FLASH_SECTOR_SIZE, 2, &mut flash).unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(nvs.read(1, &mut buf), Ok(5));
        assert_eq!(&buf, b"moved");
    }

    #[test]
    fn larger_logical_sectors() {
        let mut flash = common::Flash::new(4);

        let nvs = Nvs::new(0, 2 * FLASH_SECTOR_SIZE, 2, &mut flash).unwrap();
        let value = vec![0x42u8; 6000];
        assert_eq!(nvs.write(1, &value), Ok(6000));

        let mut buf = vec![0u8; 6000];
        assert_eq!(nvs.read(1, &mut buf), Ok(6000));
        assert_eq!(buf, value);
    }

    #[test]
    fn live_ids() {
        let mut flash = common::Flash::new(2);
        let nvs = Nvs::new(0, FLASH_SECTOR_SIZE, 2, &mut flash).unwrap();
        assert_eq!(nvs.ids(), Ok(vec![]));

        nvs.write(7, b"seven").unwrap();
        nvs.write(3, b"three").unwrap();
        nvs.write(5, b"five").unwrap();
        nvs.write(3, b"drei").unwrap();
        nvs.delete(5).unwrap();

        assert_eq!(nvs.ids(), Ok(vec![3, 7]));
    }
}
