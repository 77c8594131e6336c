#[cfg(test)]
mod tests {
    use crate::error::EngineError;
    use crate::image_cache::{ImageCache, IMAGE_CACHE_SIZE};
    use crate::resource::MemoryLoader;
    use crate::surface::PixelFormat;
    use crate::test_utils::IndexedDecoder;
    use std::rc::Rc;
    use test_log::test;

    fn loader() -> MemoryLoader {
        let mut loader = MemoryLoader::new();
        for name in ["a", "b", "c"] {
            loader.insert(name, vec![2, 1, 0, 1]);
        }
        loader
    }

    #[test]
    fn test_default_capacity() {
        let cache = ImageCache::new(IMAGE_CACHE_SIZE);
        assert_eq!(cache.capacity(), 10);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_hit_returns_same_surface_without_decoding() {
        let mut cache = ImageCache::new(4);
        let loader = loader();
        let decoder = IndexedDecoder::new();

        let first = cache.get_or_decode("a", &loader, &decoder, PixelFormat::RGB565).unwrap();
        let second = cache.get_or_decode("a", &loader, &decoder, PixelFormat::RGB565).unwrap();
        let upper = cache.get_or_decode("A", &loader, &decoder, PixelFormat::RGB565).unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert!(Rc::ptr_eq(&first, &upper));
        assert_eq!(cache.decode_count(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let mut cache = ImageCache::new(2);
        let loader = loader();
        let decoder = IndexedDecoder::new();
        let format = PixelFormat::RGB565;

        cache.get_or_decode("a", &loader, &decoder, format).unwrap();
        cache.get_or_decode("b", &loader, &decoder, format).unwrap();
        cache.get_or_decode("a", &loader, &decoder, format).unwrap();
        cache.get_or_decode("c", &loader, &decoder, format).unwrap();

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.decode_count(), 3);

        // b has to be decoded again
        cache.get_or_decode("b", &loader, &decoder, format).unwrap();
        assert_eq!(cache.decode_count(), 4);
        assert!(!cache.contains("a"));
    }

    #[test]
    fn test_missing_resource_leaves_slot_empty() {
        let mut cache = ImageCache::new(2);
        let loader = loader();
        let decoder = IndexedDecoder::new();

        let err = cache
            .get_or_decode("absent", &loader, &decoder, PixelFormat::RGB565)
            .unwrap_err();
        assert!(matches!(err, EngineError::ResourceNotFound(_)));
        assert!(cache.is_empty());
        assert!(!cache.contains("absent"));

        // The freed slot is reused
        cache.get_or_decode("a", &loader, &decoder, PixelFormat::RGB565).unwrap();
        cache.get_or_decode("b", &loader, &decoder, PixelFormat::RGB565).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_indexed_image_is_expanded_to_screen_format() {
        let mut cache = ImageCache::new(2);
        let loader = loader();
        let decoder = IndexedDecoder::new();

        let surface = cache
            .get_or_decode("a", &loader, &decoder, PixelFormat::RGB565)
            .unwrap();
        assert_eq!(surface.format, PixelFormat::RGB565);
        assert_eq!((surface.width, surface.height), (2, 1));
        assert_eq!(surface.pixel(0, 0), 0);
        assert_eq!(surface.pixel(1, 0), 0xffff);
    }

    #[test]
    fn test_indexed_image_without_palette_fails() {
        let mut cache = ImageCache::new(2);
        let loader = loader();
        let mut decoder = IndexedDecoder::new();
        decoder.with_palette = false;

        let err = cache
            .get_or_decode("a", &loader, &decoder, PixelFormat::RGB565)
            .unwrap_err();
        assert!(matches!(err, EngineError::Decode { .. }));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut cache = ImageCache::new(3);
        let loader = loader();
        let decoder = IndexedDecoder::new();
        let held = cache.get_or_decode("a", &loader, &decoder, PixelFormat::RGB565).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        // Callers still holding a surface keep it alive
        assert_eq!(held.width, 2);
    }
}
